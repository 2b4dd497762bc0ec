//! Configuration management.
//!
//! A TOML file is layered under `STRATA__SECTION__KEY` environment
//! variables, e.g. `STRATA__RUNTIME__NUM_READERS=4`.

mod settings;

pub use settings::{
    AppConfig, AppSettings, BacktestSettings, LoggingConfig, OverrideValue, StrategySettings,
};

use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

use strata_core::{StrataError, StrataResult};

fn environment() -> Environment {
    Environment::with_prefix("STRATA")
        .separator("__")
        .try_parsing(true)
}

fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> StrataResult<AppConfig> {
    let config = builder
        .add_source(environment())
        .build()
        .map_err(|e| StrataError::Config(e.to_string()))?;
    let app: AppConfig = config
        .try_deserialize()
        .map_err(|e| StrataError::Config(e.to_string()))?;
    app.validate()?;
    debug!(strategy = %app.strategy.name, symbols = app.symbols.len(), "configuration loaded");
    Ok(app)
}

/// Load configuration from a file and the environment.
pub fn load_config(path: &Path) -> StrataResult<AppConfig> {
    finish(Config::builder().add_source(File::from(path).required(true)))
}

/// Load configuration from TOML text and the environment.
pub fn load_config_str(toml: &str) -> StrataResult<AppConfig> {
    finish(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

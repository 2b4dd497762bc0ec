//! Validate configuration command.

use anyhow::Result;
use std::path::Path;

use strata_config::AppConfig;
use strata_strategies::StrategyRegistry;

use super::build_runtime;

pub fn run(config_path: &Path, loaded: Result<AppConfig>) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    if !config_path.exists() {
        println!("File not found; checking defaults and environment");
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {e:#}");
            return Err(e);
        }
    };

    let registry = StrategyRegistry::new()?;
    if !registry.exists(&config.strategy.name) {
        anyhow::bail!(
            "unknown strategy {} (available: {})",
            config.strategy.name,
            registry.names().join(", ")
        );
    }
    if !config.symbols.is_empty() {
        build_runtime(&config)?;
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Strategy: {}", config.strategy.name);
    println!("Overrides: {}", config.strategy.overrides.len());
    println!("Symbols: {}", config.symbols.join(", "));
    println!("Readers: {}", config.runtime.num_readers);
    println!("Synchronized: {}", config.runtime.synchronize);
    println!("Sequence mode: {:?}", config.runtime.sequence_mode);
    println!("Data directory: {}", config.backtest.data_dir);
    Ok(())
}

//! strata CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cli::{Cli, Commands};
use strata_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = cli::load_settings(&cli.config);

    let (level, json, log_dir) = match &loaded {
        Ok(cfg) => (
            cli.log_level
                .map_or_else(|| cfg.logging.level.clone(), |l| l.as_str().to_string()),
            cli.json_logs || cfg.logging.is_json(),
            cfg.logging.file.as_ref().map(PathBuf::from),
        ),
        Err(_) => (
            cli.log_level.map_or("info", |l| l.as_str()).to_string(),
            cli.json_logs,
            None,
        ),
    };
    let _guard = setup_logging(&level, json, log_dir.as_deref())?;

    match cli.command {
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, loaded),
        Commands::Strategies => cli::commands::strategies::run(),
        Commands::Backtest(args) => cli::commands::backtest::run(args, loaded?).await,
        Commands::FitStats(args) => cli::commands::fit_stats::run(args, loaded?).await,
        Commands::Vars(args) => cli::commands::vars::run(args, loaded?),
    }
}

//! Normalization fit command.

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use tracing::info;

use strata_backtest::BacktestEngine;
use strata_config::AppConfig;
use strata_runtime::SequenceMode;

use crate::cli::FitStatsArgs;

use super::{build_runtime, load_store};

pub async fn run(args: FitStatsArgs, mut cfg: AppConfig) -> Result<()> {
    args.run.apply(&mut cfg);
    cfg.runtime.sequence_mode = SequenceMode::Build;
    cfg.validate()?;

    let runtime = build_runtime(&cfg)?;
    let store = load_store(&cfg).await?;
    let engine = BacktestEngine::new(cfg.backtest.to_backtest_config()?);
    let report = engine.fit_normalization(Arc::clone(&runtime), store).await?;

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            fs::write(path, json)?;
            info!(
                path = %path.display(),
                features = report.features.len(),
                labels = report.labels.len(),
                "normalization statistics saved"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

//! Backtest command implementation.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::Arc;
use tracing::info;

use strata_backtest::BacktestEngine;
use strata_config::AppConfig;
use strata_monitor::{inspect_all, render_overview};
use strata_runtime::StatsReport;

use crate::cli::{BacktestArgs, OutputFormat};

use super::{build_runtime, load_store};

pub async fn run(args: BacktestArgs, mut cfg: AppConfig) -> Result<()> {
    args.run.apply(&mut cfg);
    cfg.validate()?;
    info!(strategy = %cfg.strategy.name, "starting backtest");

    let runtime = build_runtime(&cfg)?;
    if let Some(path) = &args.stats {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let stats: StatsReport = serde_json::from_str(&text)
            .with_context(|| format!("invalid statistics in {}", path.display()))?;
        runtime.context().sequences().apply_stats(&stats);
        info!(path = %path.display(), features = stats.features.len(), "normalization statistics applied");
    }

    let store = load_store(&cfg).await?;
    let engine = BacktestEngine::new(cfg.backtest.to_backtest_config()?);
    let report = engine.run(Arc::clone(&runtime), store).await?;

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }
    if args.inspect {
        println!("{}", render_overview(&inspect_all(&runtime)));
    }

    if let Some(path) = &args.save {
        fs::write(path, report.to_json()?)?;
        info!(path = %path.display(), "report saved");
    }
    if let Some(path) = &args.samples {
        let samples = runtime.collector().samples();
        let out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(out, &samples)?;
        info!(path = %path.display(), samples = samples.len(), "samples saved");
    }
    if let Some(path) = &args.snapshot {
        runtime.save_snapshot(BufWriter::new(File::create(path)?))?;
        info!(path = %path.display(), "snapshot saved");
    }
    Ok(())
}

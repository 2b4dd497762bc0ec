//! CLI command implementations.

pub mod backtest;
pub mod fit_stats;
pub mod strategies;
pub mod validate;
pub mod vars;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use strata_config::AppConfig;
use strata_data::{load_dir, BarStore};
use strata_runtime::StrategyRuntime;
use strata_strategies::StrategyRegistry;

/// Build the configured strategy and apply its overrides.
pub fn build_runtime(cfg: &AppConfig) -> Result<Arc<StrategyRuntime>> {
    let registry = StrategyRegistry::new()?;
    let symbols = cfg.symbol_registry()?;
    let runtime = registry
        .create(
            &cfg.strategy.name,
            cfg.strategy.params.clone(),
            symbols,
            cfg.runtime.clone(),
        )
        .with_context(|| format!("failed to create strategy {}", cfg.strategy.name))?;
    cfg.strategy
        .apply_overrides(&runtime)
        .context("failed to apply strategy overrides")?;
    Ok(Arc::new(runtime))
}

pub async fn load_store(cfg: &AppConfig) -> Result<Arc<BarStore>> {
    let symbols = cfg.symbol_registry()?;
    let store = load_dir(&cfg.backtest.data_dir, symbols)
        .await
        .with_context(|| format!("failed to load bars from {}", cfg.backtest.data_dir))?;
    info!(
        symbols = store.symbols().len(),
        bars = store.total_bars(),
        "bar store ready"
    );
    Ok(Arc::new(store))
}

//! Backtest runs and normalization fits over synthetic minute bars.

use std::sync::Arc;

use rust_decimal_macros::dec;
use strata_backtest::{BacktestConfig, BacktestEngine};
use strata_core::{Bar, SymbolId, SymbolRegistry};
use strata_data::BarStore;
use strata_runtime::{NormScope, RuntimeConfig, SequenceMode, StrategyRuntime};
use strata_strategies::{ThresholdBreakout, ThresholdParams};

// 2023-11-15 14:30:00 UTC
const OPEN: i64 = 1_700_058_600_000;
const MINUTE: i64 = 60_000;
const DAY: i64 = 86_400_000;

/// Twelve rising bars per day: closes 100..=111, one trade per day
/// entering at 105 and exiting at the 108 target.
fn store(symbols: &Arc<SymbolRegistry>, days: i64) -> BarStore {
    let mut store = BarStore::new(Arc::clone(symbols));
    for (sym, _) in symbols.iter() {
        let bars = (0..days)
            .flat_map(|d| {
                (0..12).map(move |i| {
                    let close = 100.0 + i as f64;
                    Bar::new(
                        OPEN + d * DAY + i * MINUTE,
                        close,
                        close + 0.5,
                        close - 0.5,
                        close,
                        1_000.0,
                    )
                })
            })
            .collect();
        store.insert(sym, bars);
    }
    store
}

fn runtime(symbols: &Arc<SymbolRegistry>, mode: SequenceMode) -> Arc<StrategyRuntime> {
    let config = RuntimeConfig {
        sequence_mode: mode,
        num_readers: 2,
        synchronize: true,
        ..RuntimeConfig::default()
    };
    let params = ThresholdParams {
        threshold: 104.5,
        stop_distance: 2.0,
        target_distance: 3.0,
    };
    Arc::new(
        StrategyRuntime::build(Arc::clone(symbols), config, |b| {
            ThresholdBreakout::new(b, params)
        })
        .unwrap(),
    )
}

fn symbols() -> Arc<SymbolRegistry> {
    Arc::new(SymbolRegistry::new(["AAPL", "MSFT"]).unwrap())
}

#[tokio::test]
async fn test_backtest_report() {
    let symbols = symbols();
    let store = Arc::new(store(&symbols, 3));
    let rt = runtime(&symbols, SequenceMode::Build);
    let engine = BacktestEngine::new(BacktestConfig {
        initial_capital: dec!(10000),
        position_size: dec!(10),
        ..BacktestConfig::default()
    });

    let report = engine.run(Arc::clone(&rt), Arc::clone(&store)).await.unwrap();
    let stats = &report.stats;
    assert_eq!(stats.total_trades, 6);
    assert_eq!(stats.winning_trades, 6);
    assert_eq!(stats.bars_processed, 72);
    assert_eq!(stats.samples, 6);
    // 6 trades of 3 points on 10 shares
    assert_eq!(stats.final_equity, dec!(10180));
    assert_eq!(report.totals.trades, 6);
    assert_eq!(report.per_symbol.len(), 2);
    assert_eq!(report.per_symbol[1].metrics.days_run, 3);
    assert_eq!(report.replay.readers, 2);

    // A second run starts from a clean runtime.
    let again = engine.run(rt, store).await.unwrap();
    assert_eq!(again.stats.total_trades, 6);
}

#[test]
fn test_start_time_warms_up() {
    let symbols = symbols();
    let store = store(&symbols, 3);
    let rt = runtime(&symbols, SequenceMode::Off);
    let engine = BacktestEngine::new(BacktestConfig {
        start_time: Some(OPEN + DAY),
        ..BacktestConfig::default()
    });

    let report = engine.run_blocking(&rt, &store).unwrap();
    assert_eq!(report.stats.total_trades, 4);
    assert_eq!(report.stats.bars_processed, 48);
    assert!(rt.trade_events().iter().all(|e| e.entry_time >= OPEN + DAY));
}

#[test]
fn test_fit_normalization_two_passes() {
    let symbols = symbols();
    let store = store(&symbols, 3);
    let rt = runtime(&symbols, SequenceMode::Build);
    let engine = BacktestEngine::default();

    let report = engine.fit_normalization_blocking(&rt, &store).unwrap();
    let log_return = report
        .features
        .iter()
        .find(|s| s.name == "log_return")
        .unwrap();
    // Six samples of nine steps each
    assert_eq!(log_return.global.count, 54);
    assert_eq!(log_return.per_symbol.len(), 2);
    assert_eq!(log_return.per_symbol[0].1.count, 27);
    assert!(log_return.global.mad > 0.0);

    let trade_return = report
        .labels
        .iter()
        .find(|s| s.name == "trade_return")
        .unwrap();
    assert_eq!(trade_return.global.count, 6);
    assert!((trade_return.global.mean - 3.0 / 105.0).abs() < 1e-9);

    // Refitting discards the previous statistics.
    let again = engine.fit_normalization_blocking(&rt, &store).unwrap();
    let refit = &again.features[0];
    assert_eq!(refit.name, log_return.name);
    assert_eq!(refit.global.count, 54);
    assert!((refit.global.median - log_return.global.median).abs() < 1e-12);
}

#[test]
fn test_fit_requires_build_mode() {
    let symbols = symbols();
    let store = store(&symbols, 1);
    let rt = runtime(&symbols, SequenceMode::Off);
    assert!(BacktestEngine::default()
        .fit_normalization_blocking(&rt, &store)
        .is_err());
}

#[test]
fn test_fitted_stats_normalize_inference() {
    let symbols = symbols();
    let store = store(&symbols, 2);
    let build = runtime(&symbols, SequenceMode::Build);
    let report = BacktestEngine::default()
        .fit_normalization_blocking(&build, &store)
        .unwrap();

    let infer = runtime(&symbols, SequenceMode::Infer);
    infer.context().sequences().apply_stats(&report);
    let feature = infer.context().sequences().feature("range_pct").unwrap();
    let fitted = feature.summary(SymbolId(0), NormScope::Global);
    let range_pct = report.features.iter().find(|s| s.name == "range_pct").unwrap();
    assert!((fitted.median - range_pct.global.median).abs() < 1e-12);
    assert!((fitted.mad - range_pct.global.mad).abs() < 1e-12);
}

#[test]
fn test_mismatched_registry_rejected() {
    let symbols = symbols();
    let other = Arc::new(SymbolRegistry::new(["AAPL"]).unwrap());
    let rt = runtime(&symbols, SequenceMode::Off);
    assert!(BacktestEngine::default()
        .run_blocking(&rt, &store(&other, 1))
        .is_err());
}

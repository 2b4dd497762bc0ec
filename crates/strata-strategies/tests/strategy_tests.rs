//! End-to-end strategy runs over synthetic minute bars.

use std::sync::Arc;

use strata_core::{Bar, PositionStatus, SymbolId, SymbolRegistry};
use strata_runtime::{LabelValue, RuntimeConfig, SequenceMode, StrategyRuntime};
use strata_strategies::{
    OpeningRangeBreakout, OrbParams, StrategyRegistry, ThresholdBreakout, ThresholdParams,
};

// 2023-11-15 14:30:00 UTC
const OPEN: i64 = 1_700_058_600_000;
const MINUTE: i64 = 60_000;

fn bar(minute: i64, close: f64, spread: f64) -> Bar {
    Bar::new(
        OPEN + minute * MINUTE,
        close,
        close + spread,
        close - spread,
        close,
        1_000.0,
    )
}

fn build_config() -> RuntimeConfig {
    RuntimeConfig {
        sequence_mode: SequenceMode::Build,
        ..RuntimeConfig::default()
    }
}

fn symbols() -> Arc<SymbolRegistry> {
    Arc::new(SymbolRegistry::new(["AAPL"]).unwrap())
}

#[test]
fn test_threshold_breakout_single_trade() {
    let params = ThresholdParams {
        threshold: 104.5,
        stop_distance: 2.0,
        target_distance: 3.0,
    };
    let rt = StrategyRuntime::build(symbols(), build_config(), |b| {
        ThresholdBreakout::new(b, params)
    })
    .unwrap();
    let sym = SymbolId(0);

    for i in 0..20 {
        rt.process_bar(&bar(i, 100.0 + i as f64, 0.5), sym).unwrap();
    }

    let trades = rt.trade_events();
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];
    assert!((trade.entry_price - 105.0).abs() < 1e-9);
    assert!((trade.exit_price - 108.0).abs() < 1e-9);
    assert!(trade.pnl > 0.0);
    assert_eq!(trade.exit_time, OPEN + 8 * MINUTE);

    let summary = rt.context().metrics().summary(sym);
    assert_eq!(summary.trades, 1);
    assert_eq!(summary.wins, 1);
    assert!((summary.profit - 3.0).abs() < 1e-9);
    assert_eq!(rt.context().positions().status(sym), PositionStatus::Free);

    let samples = rt.collector().samples();
    assert_eq!(samples.len(), 1);
    let sample = &samples[0];
    // Bars 0 through 8, the exit bar included.
    assert_eq!(sample.steps, 9);
    assert_eq!(sample.timestamp, OPEN + 8 * MINUTE);
    assert_eq!(sample.feature_names, vec!["log_return", "range_pct"]);
    let label = sample.label("trade_return").unwrap();
    match label.value {
        LabelValue::F64(v) => assert!((v - 3.0 / 105.0).abs() < 1e-9),
        other => panic!("unexpected label {other:?}"),
    }
    assert_eq!(sample.embeddings, vec![("symbol".to_string(), 0)]);
}

#[test]
fn test_threshold_breakout_next_day_trades_again() {
    let params = ThresholdParams {
        threshold: 104.5,
        stop_distance: 2.0,
        target_distance: 3.0,
    };
    let rt = StrategyRuntime::build(symbols(), build_config(), |b| {
        ThresholdBreakout::new(b, params)
    })
    .unwrap();
    let sym = SymbolId(0);
    let day = 24 * 60;
    for d in 0..2 {
        for i in 0..12 {
            rt.process_bar(&bar(d * day + i, 100.0 + i as f64, 0.5), sym)
                .unwrap();
        }
    }
    assert_eq!(rt.trade_events().len(), 2);
    assert_eq!(rt.collector().len(), 2);
    assert_eq!(rt.context().metrics().summary(sym).days_run, 2);
}

fn orb_params() -> OrbParams {
    OrbParams {
        atr_period: 3,
        atr_mult: 1.0,
        reward_risk: 1.5,
        exit_after_minutes: 5,
        ..OrbParams::default()
    }
}

/// 32 opening-range bars around 100 with a range of [99, 101], then
/// `after` closes from minute 32 on.
fn orb_day(after: &[f64]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..32).map(|i| bar(i, 100.0, 1.0)).collect();
    bars.extend(
        after
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(32 + i as i64, c, 1.0)),
    );
    bars
}

#[test]
fn test_orb_target_exit_is_success() {
    let rt = StrategyRuntime::build(symbols(), build_config(), |b| {
        OpeningRangeBreakout::new(b, orb_params())
    })
    .unwrap();
    let sym = SymbolId(0);

    // 100.2 stays inside the breakout margin, 101.5 breaks out.
    for b in orb_day(&[100.2, 101.5, 102.5, 103.5, 104.5, 104.0]) {
        rt.process_bar(&b, sym).unwrap();
    }

    let trades = rt.trade_events();
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];
    assert_eq!(trade.entry_time, OPEN + 33 * MINUTE);
    assert!((trade.entry_price - 101.5).abs() < 1e-9);
    // ATR 2.1, target 1.5 ATR above entry.
    assert!((trade.target_price - (101.5 + 3.15)).abs() < 1e-9);
    assert!((trade.exit_price - trade.target_price).abs() < 1e-9);
    assert!(!trade.time_stop);

    let samples = rt.collector().samples();
    assert_eq!(samples.len(), 1);
    let sample = &samples[0];
    assert_eq!(sample.steps, 37);
    assert_eq!(sample.feature_names.len(), 11);
    assert_eq!(sample.label("success").unwrap().value, LabelValue::Bool(true));

    let finished = sample.feature("or_finished").unwrap();
    assert_eq!(finished[31], 0.0);
    assert_eq!(finished[32], 1.0);
}

#[test]
fn test_orb_time_stop_blocks_symbol() {
    let rt = StrategyRuntime::build(symbols(), build_config(), |b| {
        OpeningRangeBreakout::new(b, orb_params())
    })
    .unwrap();
    let sym = SymbolId(0);

    let flat = [100.2, 101.5, 101.5, 101.5, 101.5, 101.5, 101.5, 101.5, 101.5];
    for b in orb_day(&flat) {
        rt.process_bar(&b, sym).unwrap();
    }

    let trades = rt.trade_events();
    assert_eq!(trades.len(), 1);
    assert!(trades[0].time_stop);
    assert_eq!(trades[0].exit_time, OPEN + 38 * MINUTE);
    assert_eq!(rt.context().positions().status(sym), PositionStatus::Blocked);
    assert_eq!(rt.context().metrics().summary(sym).time_stops, 1);

    let samples = rt.collector().samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(
        samples[0].label("success").unwrap().value,
        LabelValue::Bool(false)
    );
}

#[test]
fn test_orb_no_entry_without_breakout() {
    let rt = StrategyRegistry::new()
        .unwrap()
        .create_default("opening_range_breakout", symbols(), build_config())
        .unwrap();
    let sym = SymbolId(0);
    for b in orb_day(&[100.5; 20]) {
        rt.process_bar(&b, sym).unwrap();
    }
    assert!(rt.trade_events().is_empty());
    assert!(rt.collector().is_empty());
    assert_eq!(rt.context().positions().status(sym), PositionStatus::Free);
}

//! Per-symbol state inspection.

use serde::Serialize;

use strata_core::{DataStatus, PositionStatus, SymbolId};
use strata_runtime::{MetricsSummary, StrategyRuntime};

/// Snapshot of one symbol's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolState {
    pub symbol: String,
    pub position: PositionStatus,
    pub sequence: DataStatus,
    pub sequence_len: usize,
    pub prediction: Option<f64>,
    pub metrics: MetricsSummary,
    /// Every registered container, `(name, value)`
    pub vars: Vec<(String, String)>,
}

pub fn inspect(runtime: &StrategyRuntime, sym: SymbolId) -> SymbolState {
    let ctx = runtime.context();
    SymbolState {
        symbol: runtime.symbols().name(sym).to_string(),
        position: ctx.positions().status(sym),
        sequence: ctx.sequences().status(sym),
        sequence_len: ctx.sequences().len_of(sym),
        prediction: ctx.prediction(sym),
        metrics: ctx.metrics().summary(sym),
        vars: runtime.describe(sym),
    }
}

pub fn inspect_all(runtime: &StrategyRuntime) -> Vec<SymbolState> {
    runtime
        .symbols()
        .ids()
        .map(|sym| inspect(runtime, sym))
        .collect()
}

/// Counts across all symbols.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overview {
    pub symbols: usize,
    pub free: usize,
    pub held: usize,
    pub blocked: usize,
    pub sequences_in_progress: usize,
    pub totals: MetricsSummary,
}

impl Overview {
    pub fn from_states(states: &[SymbolState]) -> Self {
        let mut o = Overview {
            symbols: states.len(),
            ..Overview::default()
        };
        for s in states {
            match s.position {
                PositionStatus::Free => o.free += 1,
                PositionStatus::Blocked => o.blocked += 1,
                PositionStatus::LongHeld | PositionStatus::ShortHeld => o.held += 1,
            }
            if s.sequence == DataStatus::Wip {
                o.sequences_in_progress += 1;
            }
            o.totals.days_run += s.metrics.days_run;
            o.totals.trades += s.metrics.trades;
            o.totals.wins += s.metrics.wins;
            o.totals.losses += s.metrics.losses;
            o.totals.time_stops += s.metrics.time_stops;
            o.totals.profit += s.metrics.profit;
        }
        o
    }
}

/// One line per symbol.
pub fn render_overview(states: &[SymbolState]) -> String {
    let mut s = format!(
        "{:<8} {:<10} {:<9} {:>5} {:>7} {:>10} {:>10}\n",
        "SYMBOL", "POSITION", "SEQUENCE", "STEPS", "TRADES", "PNL", "PRED"
    );
    for st in states {
        let pred = st
            .prediction
            .map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
        s.push_str(&format!(
            "{:<8} {:<10} {:<9} {:>5} {:>7} {:>10.2} {:>10}\n",
            st.symbol,
            st.position.as_str(),
            st.sequence.as_str(),
            st.sequence_len,
            st.metrics.trades,
            st.metrics.profit,
            pred
        ));
    }
    let o = Overview::from_states(states);
    s.push_str(&format!(
        "{} symbols: {} free, {} held, {} blocked; {} trades, pnl {:.2}\n",
        o.symbols, o.free, o.held, o.blocked, o.totals.trades, o.totals.profit
    ));
    s
}

/// Every container of one symbol, one per line.
pub fn render_symbol(state: &SymbolState) -> String {
    let width = state.vars.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    let mut s = format!("{}\n", state.symbol);
    for (name, value) in &state.vars {
        s.push_str(&format!("  {name:<width$}  {value}\n"));
    }
    s
}

//! Per-symbol strategy runtime.
//!
//! A [`Strategy`] registers its containers, indicators, filters, features
//! and labels through a [`StrategyBuilder`]; the [`StrategyRuntime`] then
//! drives it bar by bar for every symbol, assembling training sequences on
//! the way. The [`Executor`] feeds the runtime from reader threads, either
//! replaying history or ingesting live bars, optionally keeping all symbols
//! aligned with a [`CohortBarrier`].

pub mod barrier;
pub mod builder;
pub mod config;
pub mod context;
pub mod events;
pub mod executor;
pub mod metrics;
pub mod runtime;
pub mod sequence;
pub mod strategy;

pub use barrier::{BarrierWait, CohortBarrier};
pub use builder::{Registries, StrategyBuilder};
pub use config::{NormScope, RuntimeConfig, SequenceMode, WarmUpMode};
pub use context::Context;
pub use events::{TradeEvent, TradeLog};
pub use executor::{Executor, LiveHandle, ReplaySummary, SymbolFeed};
pub use metrics::{Metrics, MetricsSummary};
pub use runtime::StrategyRuntime;
pub use sequence::{
    HeadKind, HeadSpec, Label, LabelSample, LabelValue, LossSpec, NamedStats, Sample,
    SampleCollector, SampleConsumer, SequenceBuilder, SequenceFeature, SequenceVerdict,
    StatsPhase, StatsReport,
};
pub use strategy::{StepAction, Strategy};

//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// How history before the start time is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmUpMode {
    /// Step filters and indicators only.
    #[default]
    IndicatorsOnly,
    /// Run the full per-bar pipeline with the symbol flagged as warming.
    FullReplay,
}

/// What happens to sequences that become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// Sequences are assembled but never handed off.
    #[default]
    Off,
    /// Raw samples feed the normalization statistics and the collector.
    Build,
    /// Normalized samples go to the model consumer; predictions come back.
    Infer,
}

/// Which normalizer instance scales a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormScope {
    #[default]
    Global,
    PerSymbol,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Keep every symbol within one bar of the others.
    pub synchronize: bool,
    /// Reader threads used by the executor.
    pub num_readers: usize,
    /// Longest sequence kept per symbol; older steps are dropped.
    pub max_steps: usize,
    /// Default period for filter and indicator calculations, in bars.
    pub period: usize,
    pub warm_up: WarmUpMode,
    pub sequence_mode: SequenceMode,
    pub norm_scope: NormScope,
    /// Block a symbol after every runtime-driven exit.
    pub block_after_exit: bool,
    /// Record indicator chart points while stepping.
    pub charting: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            synchronize: false,
            num_readers: 1,
            max_steps: 390,
            period: 14,
            warm_up: WarmUpMode::IndicatorsOnly,
            sequence_mode: SequenceMode::Off,
            norm_scope: NormScope::Global,
            block_after_exit: false,
            charting: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: RuntimeConfig =
            serde_json::from_str(r#"{"synchronize": true, "warm_up": "full_replay"}"#).unwrap();
        assert!(cfg.synchronize);
        assert_eq!(cfg.warm_up, WarmUpMode::FullReplay);
        assert_eq!(cfg.max_steps, 390);
        assert_eq!(cfg.sequence_mode, SequenceMode::Off);
    }
}

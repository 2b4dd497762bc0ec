//! Configuration structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use strata_backtest::BacktestConfig;
use strata_core::{StrataError, StrataResult, SymbolRegistry};
use strata_data::parse_timestamp;
use strata_runtime::{RuntimeConfig, StrategyRuntime};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl AppConfig {
    /// Checks that need no strategy or data: symbols, reader count, step
    /// limit and the backtest window.
    pub fn validate(&self) -> StrataResult<()> {
        let mut seen = HashSet::new();
        for s in &self.symbols {
            if !seen.insert(s.as_str()) {
                return Err(StrataError::Config(format!("duplicate symbol {s}")));
            }
        }
        if self.runtime.num_readers == 0 {
            return Err(StrataError::Config("runtime.num_readers must be at least 1".into()));
        }
        if self.runtime.max_steps == 0 {
            return Err(StrataError::Config("runtime.max_steps must be at least 1".into()));
        }
        if self.backtest.position_size <= Decimal::ZERO {
            return Err(StrataError::Config("backtest.position_size must be positive".into()));
        }
        self.backtest.to_backtest_config().map(|_| ())
    }

    pub fn symbol_registry(&self) -> StrataResult<Arc<SymbolRegistry>> {
        if self.symbols.is_empty() {
            return Err(StrataError::Config("no symbols configured".into()));
        }
        Ok(Arc::new(SymbolRegistry::new(&self.symbols)?))
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "strata".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily-rolling log files
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// A container default as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OverrideValue {
    /// Textual form handed to the container parser.
    pub fn to_text(&self) -> String {
        match self {
            OverrideValue::Bool(b) => b.to_string(),
            OverrideValue::Int(i) => i.to_string(),
            OverrideValue::Float(f) => f.to_string(),
            OverrideValue::Text(s) => s.clone(),
        }
    }
}

/// Which strategy to build and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Registry key
    pub name: String,
    /// Strategy parameters; missing fields take their defaults
    pub params: serde_json::Value,
    /// Container name to default value
    pub overrides: BTreeMap<String, OverrideValue>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "opening_range_breakout".to_string(),
            params: serde_json::Value::Null,
            overrides: BTreeMap::new(),
        }
    }
}

impl StrategySettings {
    /// Apply every override to the runtime, or none of them.
    pub fn apply_overrides(&self, runtime: &StrategyRuntime) -> StrataResult<()> {
        let texts: Vec<(&str, String)> = self
            .overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_text()))
            .collect();
        runtime.apply_overrides(texts.iter().map(|(k, v)| (*k, v.as_str())))
    }
}

/// Backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// Directory holding `<SYMBOL>.csv`
    pub data_dir: String,
    pub initial_capital: Decimal,
    pub position_size: Decimal,
    /// Date or timestamp; earlier bars warm the runtime up
    pub start: Option<String>,
    /// Date or timestamp, exclusive
    pub end: Option<String>,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            data_dir: "data".to_string(),
            initial_capital: dec!(100000),
            position_size: dec!(100),
            start: None,
            end: None,
        }
    }
}

impl BacktestSettings {
    pub fn to_backtest_config(&self) -> StrataResult<BacktestConfig> {
        let parse = |field: &str, text: &Option<String>| -> StrataResult<Option<i64>> {
            text.as_deref()
                .map(|t| {
                    parse_timestamp(t).map_err(|e| StrataError::InvalidValue {
                        field: format!("backtest.{field}"),
                        value: t.to_string(),
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };
        let start_time = parse("start", &self.start)?;
        let end_time = parse("end", &self.end)?;
        if let (Some(s), Some(e)) = (start_time, end_time) {
            if s >= e {
                return Err(StrataError::Config("backtest.start must precede backtest.end".into()));
            }
        }
        Ok(BacktestConfig {
            initial_capital: self.initial_capital,
            position_size: self.position_size,
            start_time,
            end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_config_str;
    use strata_runtime::{NormScope, SequenceMode, WarmUpMode};

    const SAMPLE: &str = r#"
symbols = ["AAPL", "MSFT"]

[logging]
level = "debug"
format = "json"

[runtime]
synchronize = true
num_readers = 2
warm_up = "full_replay"
sequence_mode = "build"
norm_scope = "per_symbol"

[strategy]
name = "threshold_breakout"

[strategy.params]
threshold = 101.5

[strategy.overrides]
threshold = 99
entered = false

[backtest]
data_dir = "bars"
start = "2024-01-02"
end = "2024-02-01"
"#;

    #[test]
    fn test_load_sample() {
        let cfg = load_config_str(SAMPLE).unwrap();
        assert_eq!(cfg.symbols, vec!["AAPL", "MSFT"]);
        assert!(cfg.logging.is_json());
        assert!(cfg.runtime.synchronize);
        assert_eq!(cfg.runtime.num_readers, 2);
        assert_eq!(cfg.runtime.warm_up, WarmUpMode::FullReplay);
        assert_eq!(cfg.runtime.sequence_mode, SequenceMode::Build);
        assert_eq!(cfg.runtime.norm_scope, NormScope::PerSymbol);
        assert_eq!(cfg.strategy.name, "threshold_breakout");
        assert_eq!(cfg.strategy.params["threshold"], 101.5);
        assert_eq!(
            cfg.strategy.overrides.get("entered"),
            Some(&OverrideValue::Bool(false))
        );

        let bt = cfg.backtest.to_backtest_config().unwrap();
        assert_eq!(bt.start_time, Some(1_704_153_600_000));
        assert!(bt.end_time > bt.start_time);
        assert_eq!(cfg.symbol_registry().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_is_default() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg.runtime.num_readers, 1);
        assert_eq!(cfg.strategy.name, "opening_range_breakout");
        assert!(cfg.strategy.params.is_null());
        assert!(cfg.symbol_registry().is_err());
    }

    #[test]
    fn test_validation_failures() {
        assert!(load_config_str("symbols = [\"A\", \"A\"]").is_err());
        assert!(load_config_str("[runtime]\nnum_readers = 0").is_err());
        assert!(load_config_str("[backtest]\nstart = \"someday\"").is_err());
        assert!(load_config_str("[backtest]\nstart = \"2024-02-01\"\nend = \"2024-01-01\"").is_err());
    }

    #[test]
    fn test_override_text() {
        assert_eq!(OverrideValue::Int(99).to_text(), "99");
        assert_eq!(OverrideValue::Float(1.5).to_text(), "1.5");
        assert_eq!(OverrideValue::Text("x".into()).to_text(), "x");
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let cfg = load_config_str(SAMPLE).unwrap();
        let text = toml::to_string(&cfg.runtime).unwrap();
        let back: RuntimeConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.num_readers, 2);
    }
}

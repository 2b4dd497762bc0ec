//! Strategy registry for loading strategies by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::{StrataError, StrataResult, SymbolRegistry};
use strata_runtime::{RuntimeConfig, StrategyRuntime};

use crate::params::StrategyParams;
use crate::{OpeningRangeBreakout, OrbParams, ThresholdBreakout, ThresholdParams};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub name: String,
    pub description: String,
    /// Default parameters as JSON
    pub default_params: serde_json::Value,
}

/// Registry of the built-in strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

fn info<P: StrategyParams>(name: &str, description: &str) -> StrataResult<StrategyInfo> {
    let default_params = serde_json::to_value(P::default())
        .map_err(|e| StrataError::Config(format!("{name}: {e}")))?;
    Ok(StrategyInfo {
        name: name.to_string(),
        description: description.to_string(),
        default_params,
    })
}

/// `null` stands for "all defaults".
fn parse_params<P: StrategyParams>(name: &str, params: serde_json::Value) -> StrataResult<P> {
    if params.is_null() {
        let params = P::default();
        params.validate()?;
        return Ok(params);
    }
    let params: P = serde_json::from_value(params)
        .map_err(|e| StrataError::Config(format!("invalid params for {name}: {e}")))?;
    params.validate()?;
    Ok(params)
}

impl StrategyRegistry {
    pub fn new() -> StrataResult<Self> {
        let entries = [
            info::<OrbParams>(
                "opening_range_breakout",
                "Trades breakouts from the opening range with ATR stops and a time stop",
            )?,
            info::<ThresholdParams>(
                "threshold_breakout",
                "Enters long when the close crosses a fixed level",
            )?,
        ];
        let strategies = entries
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();
        Ok(Self { strategies })
    }

    /// All strategies, sorted by name.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Build a runtime for `name`. Missing parameter fields take their
    /// defaults.
    pub fn create(
        &self,
        name: &str,
        params: serde_json::Value,
        symbols: Arc<SymbolRegistry>,
        config: RuntimeConfig,
    ) -> StrataResult<StrategyRuntime> {
        match name {
            "opening_range_breakout" => {
                let params: OrbParams = parse_params(name, params)?;
                StrategyRuntime::build(symbols, config, |b| OpeningRangeBreakout::new(b, params))
            }
            "threshold_breakout" => {
                let params: ThresholdParams = parse_params(name, params)?;
                StrategyRuntime::build(symbols, config, |b| ThresholdBreakout::new(b, params))
            }
            _ => Err(StrataError::Strategy(format!("unknown strategy: {name}"))),
        }
    }

    pub fn create_default(
        &self,
        name: &str,
        symbols: Arc<SymbolRegistry>,
        config: RuntimeConfig,
    ) -> StrataResult<StrategyRuntime> {
        let info = self
            .get(name)
            .ok_or_else(|| StrataError::Strategy(format!("unknown strategy: {name}")))?;
        self.create(name, info.default_params.clone(), symbols, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Arc<SymbolRegistry> {
        Arc::new(SymbolRegistry::new(["AAPL", "MSFT"]).unwrap())
    }

    #[test]
    fn test_registry_list_sorted() {
        let registry = StrategyRegistry::new().unwrap();
        assert_eq!(
            registry.names(),
            vec!["opening_range_breakout", "threshold_breakout"]
        );
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new().unwrap();
        let info = registry.get("opening_range_breakout").unwrap();
        assert_eq!(info.default_params["or_minutes"], 32);
        assert!(registry.exists("threshold_breakout"));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new().unwrap();
        let rt = registry
            .create_default("opening_range_breakout", symbols(), RuntimeConfig::default())
            .unwrap();
        assert_eq!(rt.name(), "opening_range_breakout");
        assert_eq!(rt.context().sequences().features().len(), 11);
        assert_eq!(rt.context().indicators().len(), 2);
        assert_eq!(rt.context().filters().len(), 1);
    }

    #[test]
    fn test_create_with_partial_params() {
        let registry = StrategyRegistry::new().unwrap();
        let params = serde_json::json!({ "threshold": 50.0 });
        let rt = registry
            .create("threshold_breakout", params, symbols(), RuntimeConfig::default())
            .unwrap();
        let defaults = rt.var_defaults();
        let threshold = defaults.iter().find(|(name, _)| name == "threshold").unwrap();
        assert_eq!(threshold.1, "50.0");
    }

    #[test]
    fn test_volume_threshold_is_a_variable() {
        let registry = StrategyRegistry::new().unwrap();
        let rt = registry
            .create_default("opening_range_breakout", symbols(), RuntimeConfig::default())
            .unwrap();
        assert!(rt
            .var_defaults()
            .iter()
            .any(|(name, value)| name == "rolling_volume.threshold" && value == "0.0"));
        rt.set_var("rolling_volume.threshold", "25000").unwrap();
        let defaults = rt.var_defaults();
        let threshold = defaults
            .iter()
            .find(|(name, _)| name == "rolling_volume.threshold")
            .unwrap();
        assert_eq!(threshold.1, "25000.0");
    }

    #[test]
    fn test_create_rejects_bad_params() {
        let registry = StrategyRegistry::new().unwrap();
        let params = serde_json::json!({ "stop_distance": -1.0 });
        assert!(registry
            .create("threshold_breakout", params, symbols(), RuntimeConfig::default())
            .is_err());
        let params = serde_json::json!({ "or_minutes": "soon" });
        assert!(registry
            .create("opening_range_breakout", params, symbols(), RuntimeConfig::default())
            .is_err());
    }

    #[test]
    fn test_create_unknown() {
        let registry = StrategyRegistry::new().unwrap();
        let err = registry
            .create_default("nope", symbols(), RuntimeConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StrataError::Strategy(_)));
    }
}

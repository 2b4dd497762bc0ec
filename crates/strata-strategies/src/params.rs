//! Strategy parameter validation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::StrataResult;

/// Serializable strategy parameters with a default set.
pub trait StrategyParams: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Check the parameters before a strategy is built from them.
    fn validate(&self) -> StrataResult<()>;
}

//! Historical bar data: CSV loading and an in-memory per-symbol store.

mod csv_source;
mod store;

pub use csv_source::{parse_timestamp, CsvDataSource};
pub use store::BarStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_core::{Bar, StrataError, StrataResult, SymbolRegistry};
use tracing::info;

/// Load bars from a CSV file on the blocking pool.
pub async fn load_csv(path: impl AsRef<Path>) -> StrataResult<Vec<Bar>> {
    let source = CsvDataSource::new(path)?;
    source.load_all().await
}

/// Load history for every registered symbol from `dir`, trying
/// `<SYMBOL>.csv`, `<symbol>.csv` and `<SYMBOL>_1min.csv` in that order.
///
/// A symbol without a file is an error; every symbol must have history.
pub async fn load_dir(dir: impl AsRef<Path>, symbols: Arc<SymbolRegistry>) -> StrataResult<BarStore> {
    let dir = dir.as_ref();
    let mut store = BarStore::new(Arc::clone(&symbols));
    for (sym, name) in symbols.iter() {
        let path = symbol_file(dir, name).ok_or_else(|| {
            StrataError::Data(format!("no CSV for {name} in {}", dir.display()))
        })?;
        let bars = load_csv(&path)
            .await
            .map_err(|e| StrataError::Data(format!("{name}: {e}")))?;
        info!(symbol = %name, bars = bars.len(), path = %path.display(), "bars loaded");
        store.insert(sym, bars);
    }
    Ok(store)
}

fn symbol_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let lower = name.to_lowercase();
    [
        dir.join(format!("{name}.csv")),
        dir.join(format!("{lower}.csv")),
        dir.join(format!("{name}_1min.csv")),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

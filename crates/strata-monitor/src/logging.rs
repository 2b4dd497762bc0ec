//! Logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::{StrataError, StrataResult};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`. With `log_dir`, JSON lines are also
/// written to a daily-rolling `strata.log` there; keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn setup_logging(
    level: &str,
    json: bool,
    log_dir: Option<&Path>,
) -> StrataResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().pretty().boxed()
    };

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "strata.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| StrataError::Config(format!("logging already initialized: {e}")))?;
    Ok(guard)
}

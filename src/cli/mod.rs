//! CLI definitions.

pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use strata_config::{load_config, load_config_str, AppConfig};

#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about = "Per-symbol strategy runtime and sequence dataset builder")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "STRATA_CONFIG")]
    pub config: PathBuf,

    /// Log level; defaults to the configured level
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay historical bars through a strategy
    Backtest(BacktestArgs),
    /// Fit normalization statistics with two replays
    FitStats(FitStatsArgs),
    /// List available strategies
    Strategies,
    /// Show the variables a strategy registers and their defaults
    Vars(VarsArgs),
    /// Validate configuration
    ValidateConfig,
}

/// Settings shared by every command that builds a runtime. Each one
/// overrides the configuration file when given.
#[derive(clap::Args, Clone, Default)]
pub struct RunArgs {
    /// Strategy to run
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Symbols (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Directory of per-symbol CSV files
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Start date; earlier bars warm the strategy up
    #[arg(long)]
    pub start: Option<String>,

    /// End date (exclusive)
    #[arg(long)]
    pub end: Option<String>,

    /// Reader threads
    #[arg(long)]
    pub readers: Option<usize>,
}

impl RunArgs {
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(s) = &self.strategy {
            cfg.strategy.name = s.clone();
        }
        if !self.symbols.is_empty() {
            cfg.symbols = self.symbols.clone();
        }
        if let Some(d) = &self.data {
            cfg.backtest.data_dir = d.display().to_string();
        }
        if self.start.is_some() {
            cfg.backtest.start = self.start.clone();
        }
        if self.end.is_some() {
            cfg.backtest.end = self.end.clone();
        }
        if let Some(n) = self.readers {
            cfg.runtime.num_readers = n;
        }
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Fitted statistics (from fit-stats) for normalized inference
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to a file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Write collected sequence samples as JSON
    #[arg(long)]
    pub samples: Option<PathBuf>,

    /// Write a binary snapshot of the final runtime state
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Print per-symbol runtime state after the run
    #[arg(long)]
    pub inspect: bool,
}

#[derive(clap::Args)]
pub struct FitStatsArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct VarsArgs {
    /// Strategy to describe; defaults to the configured one
    #[arg(short, long)]
    pub strategy: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Load the configuration file. A missing file yields the defaults plus
/// environment overrides.
pub fn load_settings(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path).with_context(|| format!("failed to load {}", path.display()))
    } else {
        load_config_str("").context("failed to load default configuration")
    }
}

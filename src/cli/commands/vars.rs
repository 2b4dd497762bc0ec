//! Strategy variables command.

use anyhow::Result;

use strata_config::AppConfig;

use crate::cli::{OutputFormat, VarsArgs};

use super::build_runtime;

pub fn run(args: VarsArgs, mut cfg: AppConfig) -> Result<()> {
    if let Some(s) = args.strategy {
        cfg.strategy.name = s;
    }
    if cfg.symbols.is_empty() {
        cfg.symbols = vec!["SYMBOL".to_string()];
    }
    let runtime = build_runtime(&cfg)?;
    let vars = runtime.var_defaults();

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&vars)?),
        OutputFormat::Text => {
            let width = vars.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
            println!("Variables of {}", runtime.name());
            for (name, default) in &vars {
                println!("  {name:<width$}  {default}");
            }
        }
    }
    Ok(())
}

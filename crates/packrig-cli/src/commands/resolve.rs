//! Resolve command
//!
//! Usage: packrig resolve <CONFIG> [--mode <MODE>] [--target <TARGET>] [--output <FILE>]

use std::path::PathBuf;

use clap::Args;
use packrig_core::errors::PackrigError;
use packrig_core::{validate, ConfigDefaulter, OptionValue};

use super::ConfigArgs;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute resolve command
pub fn execute(args: ResolveArgs) -> anyhow::Result<()> {
    let raw = args.config.load()?;

    let issues = validate(&raw);
    if !issues.is_empty() {
        return Err(PackrigError::ConfigValidation { issues }.into());
    }

    let defaulter = ConfigDefaulter::new();
    let resolved = match &raw {
        OptionValue::Object(config) => OptionValue::Object(defaulter.apply(config)?),
        OptionValue::Array(configs) => OptionValue::Array(
            configs
                .iter()
                .filter_map(OptionValue::as_object)
                .map(|config| defaulter.apply(config).map(OptionValue::Object))
                .collect::<packrig_core::Result<Vec<_>>>()?,
        ),
        other => anyhow::bail!("Expected a configuration object, got {}", other.type_name()),
    };

    let json = serde_json::to_string_pretty(&resolved)?;
    if let Some(output_path) = args.output {
        std::fs::write(&output_path, json)?;
        println!("✓ Resolved configuration written to {}", output_path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

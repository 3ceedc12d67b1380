//! Validate command
//!
//! Usage: packrig validate <CONFIG>

use clap::Args;
use packrig_core::validate;

use super::ConfigArgs;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute validate command
///
/// Every violation is printed before the command fails.
pub fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    let raw = args.config.load()?;
    let issues = validate(&raw);

    if issues.is_empty() {
        println!("✓ {} is valid", args.config.config.display());
        return Ok(());
    }

    for issue in &issues {
        println!(" - {}", issue);
    }
    anyhow::bail!("{} schema violation(s)", issues.len())
}

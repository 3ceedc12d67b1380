//! packrig CLI
//!
//! Command-line interface for resolving, validating and dry-run building
//! packrig configurations

use clap::{Parser, Subcommand, ValueEnum};
use packrig_core::errors::{PackrigError, RigError};
use packrig_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable logs
    Pretty,
    /// One JSON object per log line
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "packrig", version)]
#[command(about = "packrig - build configuration resolver", long_about = None)]
struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the fully resolved configuration as JSON
    Resolve(commands::resolve::ResolveArgs),
    /// Check a configuration and list every violation
    Validate(commands::validate::ValidateArgs),
    /// Bootstrap the pipeline and run (or watch) with the dry-run backend
    Build(commands::build::BuildArgs),
}

fn main() {
    let cli = Cli::parse();

    init(match cli.log_format {
        LogFormat::Pretty => Profile::Development,
        LogFormat::Json => Profile::Production,
    });

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Build(args) => commands::build::execute(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<PackrigError>() {
            Some(err) => eprintln!("Error [{}]: {}", RigError::from(err).code(), err),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

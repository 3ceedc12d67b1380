//! Build command
//!
//! Usage: packrig build <CONFIG> [--mode <MODE>] [--target <TARGET>] [--watch]
//!
//! Bootstraps the pipeline with the dry-run backend. In watch mode the first
//! cycle is reported and the watch is closed again.

use std::sync::{Arc, Mutex, PoisonError};

use clap::Args;
use packrig_core::{launch, BuildError, Stats};

use super::ConfigArgs;

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute build command
pub fn execute(args: BuildArgs) -> anyhow::Result<()> {
    let raw = args.config.load()?;

    let outcome: Arc<Mutex<Option<Result<Stats, BuildError>>>> = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    let mut launched = launch(
        &raw,
        Box::new(move |result| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        }),
    )?;

    if let Some(watch) = launched.watch_handle_mut() {
        tracing::info!(sessions = watch.session_count(), "closing dry-run watch");
        watch.close()?;
    }

    let result = outcome.lock().unwrap_or_else(PoisonError::into_inner).take();
    match result {
        Some(Ok(stats)) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Some(Err(err)) => Err(err.into()),
        None => anyhow::bail!("build finished without reporting an outcome"),
    }
}

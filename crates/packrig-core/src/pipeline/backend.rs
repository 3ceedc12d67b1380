//! Build backend seam
//!
//! The pipeline hands the actual build to a [`BuildBackend`]. The module
//! graph, chunking and emission live behind this trait; [`DryRunBackend`]
//! only reports what would be built.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::value::{lookup, OptionMap, OptionValue};

/// Failure of a build cycle, delivered through the completion callback
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Build failed: {message}")]
    Failed { message: String },

    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("{} of {total} builds failed", .errors.len())]
    Multi { total: usize, errors: Vec<BuildError> },
}

/// Everything a backend needs to build one configuration
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub name: Option<String>,
    pub context: PathBuf,
    pub options: OptionMap,
    pub plugins: Vec<String>,
}

/// Outcome of one successful build cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub name: Option<String>,
    pub context: String,
    pub entry: serde_json::Value,
    pub output_path: Option<String>,
    pub plugins: Vec<String>,
    pub cycle: usize,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Statistics handed to the completion callback
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Stats {
    Single(BuildSummary),
    Multi(Vec<BuildSummary>),
}

impl Stats {
    pub fn summaries(&self) -> Vec<&BuildSummary> {
        match self {
            Stats::Single(summary) => vec![summary],
            Stats::Multi(summaries) => summaries.iter().collect(),
        }
    }
}

/// Completion callback: once per run, once per cycle while watching
pub type BuildCallback = Box<dyn FnMut(Result<Stats, BuildError>) + Send>;

/// Per-cycle callback used between a pipeline and its backend
pub type CycleCallback = Box<dyn FnMut(Result<BuildSummary, BuildError>) + Send>;

/// Watch settings taken from `watchOptions`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchOptions {
    settings: OptionMap,
}

impl WatchOptions {
    /// Settings from a `watchOptions` value; anything but a mapping means `{}`
    pub fn from_value(value: Option<&OptionValue>) -> Self {
        Self {
            settings: value
                .and_then(OptionValue::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Delay in milliseconds before rebuilding after a change
    pub fn aggregate_timeout(&self) -> u64 {
        self.settings
            .get("aggregateTimeout")
            .and_then(OptionValue::as_f64)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map_or(300, |ms| ms as u64)
    }

    pub fn poll(&self) -> Option<&OptionValue> {
        self.settings.get("poll")
    }

    pub fn settings(&self) -> &OptionMap {
        &self.settings
    }
}

/// A running watch loop
pub trait WatchSession: Send {
    /// Stop watching; idempotent
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Executes builds for a pipeline
pub trait BuildBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run one build to completion
    fn build(&self, job: &BuildJob) -> Result<BuildSummary, BuildError>;

    /// Start watching; `on_cycle` is invoked after every build cycle until
    /// the returned session is closed
    fn watch(
        &self,
        job: BuildJob,
        options: &WatchOptions,
        on_cycle: CycleCallback,
    ) -> Box<dyn WatchSession>;
}

/// Backend that resolves what would be built without emitting anything
#[derive(Debug, Default)]
pub struct DryRunBackend {
    cycles: AtomicUsize,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build cycles completed so far, across runs and watches
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl BuildBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn build(&self, job: &BuildJob) -> Result<BuildSummary, BuildError> {
        let started_at = Utc::now();
        let entry = job
            .options
            .get("entry")
            .map(OptionValue::to_json)
            .transpose()
            .map_err(|err| BuildError::Failed {
                message: format!("entry is not representable: {err}"),
            })?
            .unwrap_or(serde_json::Value::Null);
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            backend = self.name(),
            name = job.name.as_deref().unwrap_or(""),
            cycle,
            "dry-run build"
        );

        Ok(BuildSummary {
            name: job.name.clone(),
            context: job.context.to_string_lossy().into_owned(),
            entry,
            output_path: lookup(&job.options, "output.path")
                .and_then(OptionValue::as_str)
                .map(str::to_string),
            plugins: job.plugins.clone(),
            cycle,
            dry_run: true,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Runs a single cycle immediately; there is no file system to observe
    fn watch(
        &self,
        job: BuildJob,
        options: &WatchOptions,
        mut on_cycle: CycleCallback,
    ) -> Box<dyn WatchSession> {
        tracing::debug!(
            backend = self.name(),
            aggregate_timeout_ms = options.aggregate_timeout(),
            "dry-run watch started"
        );
        on_cycle(self.build(&job));
        Box::new(DryRunSession::default())
    }
}

#[derive(Debug, Default)]
struct DryRunSession {
    closed: bool,
}

impl WatchSession for DryRunSession {
    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Backend whose watch cycles are driven by hand
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ManualBackend {
    inner: DryRunBackend,
    watchers: std::sync::Mutex<Vec<(BuildJob, CycleCallback)>>,
}

#[cfg(test)]
impl ManualBackend {
    /// Complete one build cycle of the `index`-th watch started on this backend
    pub(crate) fn cycle(&self, index: usize) {
        let mut watchers = self
            .watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (job, on_cycle) = &mut watchers[index];
        let outcome = self.inner.build(job);
        on_cycle(outcome);
    }
}

#[cfg(test)]
impl BuildBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    fn build(&self, job: &BuildJob) -> Result<BuildSummary, BuildError> {
        self.inner.build(job)
    }

    fn watch(
        &self,
        job: BuildJob,
        _options: &WatchOptions,
        on_cycle: CycleCallback,
    ) -> Box<dyn WatchSession> {
        self.watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((job, on_cycle));
        Box::new(DryRunSession::default())
    }
}

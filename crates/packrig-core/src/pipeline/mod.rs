//! Build pipeline
//!
//! A [`Pipeline`] owns one resolved configuration, the hook registry plugins
//! tap into and the record of attached plugins. Builds are delegated to a
//! [`BuildBackend`]; outcomes travel through the completion callback.

pub mod backend;
pub mod multi;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use backend::{
    BuildBackend, BuildCallback, BuildError, BuildJob, BuildSummary, CycleCallback,
    DryRunBackend, Stats, WatchOptions, WatchSession,
};
pub use multi::MultiPipeline;

use crate::environment::EnvironmentServices;
use crate::errors::{PackrigError, Result};
use crate::hooks::{self, HookRegistry};
use crate::plugin::PluginEntry;
use crate::value::{OptionMap, OptionValue};

/// A single-configuration build pipeline
pub struct Pipeline {
    context: PathBuf,
    options: OptionMap,
    hooks: HookRegistry,
    environment: Option<EnvironmentServices>,
    plugins: Vec<String>,
    builtins: Vec<(String, OptionMap)>,
    backend: Arc<dyn BuildBackend>,
}

impl Pipeline {
    /// Create a pipeline rooted at `context` that owns `options`
    pub fn new(
        context: impl Into<PathBuf>,
        options: OptionMap,
        backend: Arc<dyn BuildBackend>,
    ) -> Self {
        Self {
            context: context.into(),
            options,
            hooks: HookRegistry::new(),
            environment: None,
            plugins: Vec::new(),
            builtins: Vec::new(),
            backend,
        }
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    /// The configuration's `name`, if it has a string one
    pub fn name(&self) -> Option<&str> {
        self.options.get("name").and_then(OptionValue::as_str)
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    /// Replace the owned configuration (used after built-ins annotate it)
    pub fn replace_options(&mut self, options: OptionMap) {
        self.options = options;
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Fire a lifecycle hook
    pub fn fire(&self, hook: &str) -> Result<usize> {
        self.hooks.call(hook)
    }

    pub fn environment(&self) -> Option<&EnvironmentServices> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, services: EnvironmentServices) {
        self.environment = Some(services);
    }

    /// Attach a plugin by invoking its `apply` with this pipeline
    ///
    /// The plugin is recorded only once `apply` succeeded.
    pub fn attach_plugin(&mut self, plugin: &PluginEntry) -> Result<()> {
        let name = plugin.name().to_string();
        tracing::debug!(plugin = %name, "attaching plugin");
        plugin
            .apply(self)
            .map_err(|source| PackrigError::PluginApplication {
                plugin: name.clone(),
                source,
            })?;
        self.plugins.push(name);
        Ok(())
    }

    /// Names of the attached plugins, in attachment order
    pub fn attached_plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Record a built-in plugin's settings
    pub fn register_builtin(&mut self, name: impl Into<String>, settings: OptionMap) {
        self.builtins.push((name.into(), settings));
    }

    /// Settings of the first registered built-in called `name`
    pub fn builtin_settings(&self, name: &str) -> Option<&OptionMap> {
        self.builtins
            .iter()
            .find(|(builtin, _)| builtin == name)
            .map(|(_, settings)| settings)
    }

    pub fn backend(&self) -> &Arc<dyn BuildBackend> {
        &self.backend
    }

    fn job(&self) -> BuildJob {
        BuildJob {
            name: self.name().map(str::to_string),
            context: self.context.clone(),
            options: self.options.clone(),
            plugins: self.plugins.clone(),
        }
    }

    /// Run one build; `callback` is invoked exactly once with the outcome
    pub fn run(&self, mut callback: BuildCallback) {
        if let Err(err) = self.fire(hooks::BEFORE_RUN).and_then(|_| self.fire(hooks::RUN)) {
            callback(Err(hook_failure(&err)));
            return;
        }

        let outcome = self.backend.build(&self.job());
        callback(finish_cycle(&self.hooks, outcome).map(Stats::Single));
    }

    /// Start watching; `callback` is invoked after every build cycle
    ///
    /// Each cycle fires `watchRun`, then `done` or `failed`.
    pub fn watch(&self, options: &WatchOptions, mut callback: BuildCallback) -> WatchHandle {
        let registry = self.hooks.clone();
        let cycle_hooks = registry.clone();
        let session = self.backend.watch(
            self.job(),
            options,
            Box::new(move |outcome| {
                callback(watch_cycle(&cycle_hooks, outcome).map(Stats::Single));
            }),
        );
        WatchHandle::new(vec![session], vec![registry])
    }

    /// Start watching and deliver raw per-cycle summaries
    ///
    /// Used by [`MultiPipeline`] to aggregate its members' cycles.
    pub(crate) fn watch_cycles(
        &self,
        options: &WatchOptions,
        mut on_cycle: CycleCallback,
    ) -> WatchHandle {
        let registry = self.hooks.clone();
        let cycle_hooks = registry.clone();
        let session = self.backend.watch(
            self.job(),
            options,
            Box::new(move |outcome| on_cycle(watch_cycle(&cycle_hooks, outcome))),
        );
        WatchHandle::new(vec![session], vec![registry])
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("context", &self.context)
            .field("plugins", &self.plugins)
            .field("hooks", &self.hooks)
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn hook_failure(err: &PackrigError) -> BuildError {
    match err {
        PackrigError::HookFailed { hook, .. } => BuildError::Hook {
            hook: hook.clone(),
            message: err.to_string(),
        },
        other => BuildError::Failed {
            message: other.to_string(),
        },
    }
}

/// Fire `done` or `failed` for a finished cycle
fn finish_cycle(
    registry: &HookRegistry,
    outcome: std::result::Result<BuildSummary, BuildError>,
) -> std::result::Result<BuildSummary, BuildError> {
    match outcome {
        Ok(summary) => {
            registry.call(hooks::DONE).map_err(|err| hook_failure(&err))?;
            Ok(summary)
        }
        Err(err) => {
            if let Err(hook_err) = registry.call(hooks::FAILED) {
                tracing::warn!(error = %hook_err, "failed hook listener errored");
            }
            Err(err)
        }
    }
}

/// Fire `watchRun` for a rebuilt cycle, then finish it
fn watch_cycle(
    registry: &HookRegistry,
    outcome: std::result::Result<BuildSummary, BuildError>,
) -> std::result::Result<BuildSummary, BuildError> {
    registry
        .call(hooks::WATCH_RUN)
        .map_err(|err| hook_failure(&err))?;
    finish_cycle(registry, outcome)
}

/// Handle to a running watch; closing it stops every underlying session
pub struct WatchHandle {
    sessions: Vec<Box<dyn WatchSession>>,
    hooks: Vec<HookRegistry>,
    closed: bool,
}

impl WatchHandle {
    pub(crate) fn new(sessions: Vec<Box<dyn WatchSession>>, hooks: Vec<HookRegistry>) -> Self {
        Self {
            sessions,
            hooks,
            closed: false,
        }
    }

    /// Combine several handles into one
    pub(crate) fn merge(handles: Vec<WatchHandle>) -> Self {
        let mut merged = Self::new(Vec::new(), Vec::new());
        for handle in handles {
            merged.sessions.extend(handle.sessions);
            if !handle.closed {
                merged.hooks.extend(handle.hooks);
            }
        }
        merged.closed = merged.sessions.is_empty();
        merged
    }

    /// Stop watching and fire `watchClose`; a second close is a no-op
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for session in &mut self.sessions {
            session.close();
        }
        for registry in &self.hooks {
            registry.call(hooks::WATCH_CLOSE)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("sessions", &self.sessions.len())
            .field("closed", &self.closed)
            .finish()
    }
}

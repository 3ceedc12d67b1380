use std::sync::{Arc, Mutex};

use packrig_core::hooks;
use packrig_core::pipeline::{
    BuildBackend, BuildError, BuildJob, BuildSummary, CycleCallback, DryRunBackend, WatchOptions,
    WatchSession,
};
use packrig_core::{Bootstrapper, ConfigDefaulter, OptionMap, OptionValue, Pipeline, Plugin};

/// Working directory every test defaulter is rooted at
#[allow(dead_code)]
pub const TEST_CWD: &str = "/work";

/// Convert a JSON object literal into an option map
#[allow(dead_code)]
pub fn raw(json: serde_json::Value) -> OptionMap {
    match OptionValue::from(json) {
        OptionValue::Object(map) => map,
        other => panic!("expected an object, got {}", other.type_name()),
    }
}

/// Resolve defaults for a JSON config with a defaulter rooted at [`TEST_CWD`]
#[allow(dead_code)]
pub fn resolve(json: serde_json::Value) -> OptionMap {
    ConfigDefaulter::with_cwd(TEST_CWD).apply(&raw(json)).unwrap()
}

/// Bootstrapper rooted at [`TEST_CWD`] building through `backend`
#[allow(dead_code)]
pub fn bootstrapper(backend: Arc<dyn BuildBackend>) -> Bootstrapper {
    Bootstrapper::new()
        .with_defaulter(ConfigDefaulter::with_cwd(TEST_CWD))
        .with_backend(backend)
}

/// Bootstrapper with the dry-run backend
#[allow(dead_code)]
pub fn dry_run_bootstrapper() -> Bootstrapper {
    bootstrapper(Arc::new(DryRunBackend::new()))
}

/// Shared, ordered log of what happened during a test
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Plugin that records its attachment and every bootstrap hook it sees
#[allow(dead_code)]
pub struct RecordingPlugin {
    pub name: String,
    pub log: EventLog,
}

#[allow(dead_code)]
impl RecordingPlugin {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
        }
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, pipeline: &mut Pipeline) -> anyhow::Result<()> {
        self.log.push(format!("apply:{}", self.name));
        for hook in [
            hooks::ENVIRONMENT,
            hooks::AFTER_ENVIRONMENT,
            hooks::ENTRY_OPTION,
            hooks::AFTER_PLUGINS,
            hooks::AFTER_RESOLVERS,
            hooks::DONE,
        ] {
            let log = self.log.clone();
            let name = self.name.clone();
            pipeline.hooks_mut().tap(hook, name.clone(), move || {
                log.push(format!("{hook}:{name}"));
                Ok(())
            });
        }
        Ok(())
    }
}

/// Plugin whose `apply` always fails
#[allow(dead_code)]
pub struct FailingPlugin;

impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        "FailingPlugin"
    }

    fn apply(&self, _pipeline: &mut Pipeline) -> anyhow::Result<()> {
        anyhow::bail!("refusing to attach")
    }
}

/// Backend recording every build and watch request
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingBackend {
    inner: DryRunBackend,
    pub builds: Mutex<Vec<BuildJob>>,
    pub watches: Mutex<Vec<(Option<String>, WatchOptions)>>,
    pub fail_builds: bool,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_builds: true,
            ..Self::default()
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }
}

impl BuildBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn build(&self, job: &BuildJob) -> Result<BuildSummary, BuildError> {
        self.builds.lock().unwrap().push(job.clone());
        if self.fail_builds {
            return Err(BuildError::Failed {
                message: "recording backend set to fail".to_string(),
            });
        }
        self.inner.build(job)
    }

    fn watch(
        &self,
        job: BuildJob,
        options: &WatchOptions,
        mut on_cycle: CycleCallback,
    ) -> Box<dyn WatchSession> {
        self.watches
            .lock()
            .unwrap()
            .push((job.name.clone(), options.clone()));
        on_cycle(self.build(&job));
        Box::new(RecordingSession::default())
    }
}

#[allow(dead_code)]
#[derive(Default)]
struct RecordingSession {
    closed: bool,
}

impl WatchSession for RecordingSession {
    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

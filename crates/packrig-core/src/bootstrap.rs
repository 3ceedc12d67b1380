//! Pipeline bootstrap
//!
//! Turns a raw configuration into a ready pipeline:
//!
//! 1. validate the raw input, reporting every violation at once
//! 2. fan out over an array input, bootstrapping each element on its own
//! 3. resolve defaults
//! 4. construct the pipeline rooted at the resolved `context`
//! 5. attach the environment plugin
//! 6. attach user plugins in order
//! 7. fire `environment` then `afterEnvironment`
//! 8. apply built-ins
//! 9. optionally dispatch a run or a watch
//!
//! Every failure up to step 8 is returned synchronously; only build
//! outcomes travel through the completion callback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use packrig_core_types::RequestId;

use crate::builtins::{BuiltinOptionsApply, OptionsApply};
use crate::defaults::ConfigDefaulter;
use crate::environment::EnvironmentPlugin;
use crate::errors::{PackrigError, Result};
use crate::hooks;
use crate::pipeline::{
    BuildBackend, BuildCallback, DryRunBackend, MultiPipeline, Pipeline, WatchHandle, WatchOptions,
};
use crate::plugin::PluginEntry;
use crate::validation::{SchemaValidator, StandardSchemaValidator};
use crate::value::{truthy, OptionMap, OptionValue};
use crate::{log_op_end, log_op_error, log_op_start};

/// A bootstrapped pipeline: single or composite
#[derive(Debug)]
pub enum PipelineHandle {
    Single(Pipeline),
    Multi(MultiPipeline),
}

impl PipelineHandle {
    pub fn as_single(&self) -> Option<&Pipeline> {
        match self {
            PipelineHandle::Single(pipeline) => Some(pipeline),
            PipelineHandle::Multi(_) => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultiPipeline> {
        match self {
            PipelineHandle::Single(_) => None,
            PipelineHandle::Multi(multi) => Some(multi),
        }
    }

    /// Member pipelines in configuration order
    pub fn pipelines(&self) -> Vec<&Pipeline> {
        match self {
            PipelineHandle::Single(pipeline) => vec![pipeline],
            PipelineHandle::Multi(multi) => multi.pipelines().iter().collect(),
        }
    }

    pub fn run(&self, callback: BuildCallback) {
        match self {
            PipelineHandle::Single(pipeline) => pipeline.run(callback),
            PipelineHandle::Multi(multi) => multi.run(callback),
        }
    }

    /// Watch with each member's own `watchOptions` (or `{}`)
    pub fn watch(&self, callback: BuildCallback) -> Result<WatchHandle> {
        match self {
            PipelineHandle::Single(pipeline) => {
                let options = WatchOptions::from_value(pipeline.options().get("watchOptions"));
                Ok(pipeline.watch(&options, callback))
            }
            PipelineHandle::Multi(multi) => {
                let options: Vec<WatchOptions> = multi
                    .pipelines()
                    .iter()
                    .map(|p| WatchOptions::from_value(p.options().get("watchOptions")))
                    .collect();
                multi.watch(&options, callback)
            }
        }
    }

    /// Whether the configuration asks for watch mode
    ///
    /// A single configuration watches only for `watch: true`; a composite
    /// watches when any member's `watch` is truthy.
    pub fn wants_watch(&self) -> bool {
        match self {
            PipelineHandle::Single(pipeline) => {
                pipeline.options().get("watch") == Some(&OptionValue::Bool(true))
            }
            PipelineHandle::Multi(multi) => multi
                .pipelines()
                .iter()
                .any(|p| truthy(p.options().get("watch"))),
        }
    }
}

/// Result of [`Bootstrapper::launch`]
#[derive(Debug)]
pub enum Launched {
    /// A single run was dispatched
    Ran(PipelineHandle),
    /// A watch was started; close `watch` to stop it
    Watching {
        pipeline: PipelineHandle,
        watch: WatchHandle,
    },
}

impl Launched {
    pub fn pipeline(&self) -> &PipelineHandle {
        match self {
            Launched::Ran(pipeline) => pipeline,
            Launched::Watching { pipeline, .. } => pipeline,
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self, Launched::Watching { .. })
    }

    pub fn watch_handle_mut(&mut self) -> Option<&mut WatchHandle> {
        match self {
            Launched::Ran(_) => None,
            Launched::Watching { watch, .. } => Some(watch),
        }
    }
}

/// Configurable bootstrap
///
/// Each collaborator (validator, defaulter, built-ins, backend) can be
/// replaced; [`Bootstrapper::new`] wires the standard ones.
#[derive(Clone)]
pub struct Bootstrapper {
    validator: Arc<dyn SchemaValidator>,
    defaulter: ConfigDefaulter,
    options_apply: Arc<dyn OptionsApply>,
    backend: Arc<dyn BuildBackend>,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self {
            validator: Arc::new(StandardSchemaValidator),
            defaulter: ConfigDefaulter::new(),
            options_apply: Arc::new(BuiltinOptionsApply),
            backend: Arc::new(DryRunBackend::new()),
        }
    }

    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_defaulter(mut self, defaulter: ConfigDefaulter) -> Self {
        self.defaulter = defaulter;
        self
    }

    pub fn with_options_apply(mut self, options_apply: impl OptionsApply + 'static) -> Self {
        self.options_apply = Arc::new(options_apply);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn BuildBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn defaulter(&self) -> &ConfigDefaulter {
        &self.defaulter
    }

    /// Bootstrap `raw` without dispatching a build
    pub fn create(&self, raw: &OptionValue) -> Result<PipelineHandle> {
        let request_id = RequestId::new();
        let start = Instant::now();
        log_op_start!("bootstrap", request_id = %request_id);

        match self.create_inner(raw) {
            Ok(handle) => {
                log_op_end!(
                    "bootstrap",
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = %request_id,
                    config_count = handle.pipelines().len()
                );
                Ok(handle)
            }
            Err(err) => {
                log_op_error!(
                    "bootstrap",
                    err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = %request_id
                );
                Err(err)
            }
        }
    }

    /// Bootstrap `raw` and dispatch a run or a watch with `callback`
    pub fn launch(&self, raw: &OptionValue, callback: BuildCallback) -> Result<Launched> {
        let handle = self.create(raw)?;
        if handle.wants_watch() {
            tracing::info!(op = "launch", mode = "watch", "dispatching");
            let watch = handle.watch(callback)?;
            return Ok(Launched::Watching {
                pipeline: handle,
                watch,
            });
        }

        tracing::info!(op = "launch", mode = "run", "dispatching");
        handle.run(callback);
        Ok(Launched::Ran(handle))
    }

    fn create_inner(&self, raw: &OptionValue) -> Result<PipelineHandle> {
        let issues = self.validator.validate(raw);
        if !issues.is_empty() {
            return Err(PackrigError::ConfigValidation { issues });
        }

        match raw {
            OptionValue::Object(config) => {
                self.bootstrap_one(config, 0).map(PipelineHandle::Single)
            }
            OptionValue::Array(configs) => {
                let pipelines = configs
                    .iter()
                    .enumerate()
                    .map(|(index, config)| match config {
                        OptionValue::Object(config) => self.bootstrap_one(config, index),
                        other => Err(PackrigError::InvalidArgument {
                            argument: format!("options[{index}]"),
                            reason: format!("expected an object, got {}", other.type_name()),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(PipelineHandle::Multi(MultiPipeline::new(pipelines)))
            }
            other => Err(PackrigError::InvalidArgument {
                argument: "options".to_string(),
                reason: format!(
                    "expected an object or an array of objects, got {}",
                    other.type_name()
                ),
            }),
        }
    }

    fn bootstrap_one(&self, config: &OptionMap, index: usize) -> Result<Pipeline> {
        let resolved = self.defaulter.apply(config)?;

        let context = resolved
            .get("context")
            .and_then(OptionValue::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.defaulter.cwd().to_path_buf());
        let environment = EnvironmentPlugin::from_options(resolved.get("infrastructureLogging"));
        let user_plugins: Vec<PluginEntry> = match resolved.get("plugins") {
            Some(OptionValue::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    let plugin = item.as_plugin().cloned();
                    if plugin.is_none() {
                        tracing::warn!(
                            config_index = index,
                            kind = item.type_name(),
                            "skipping non-plugin entry in plugins"
                        );
                    }
                    plugin
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut pipeline = Pipeline::new(context, resolved, self.backend.clone());
        pipeline.attach_plugin(&PluginEntry::direct(environment))?;
        for plugin in &user_plugins {
            pipeline.attach_plugin(plugin)?;
        }

        pipeline.fire(hooks::ENVIRONMENT)?;
        pipeline.fire(hooks::AFTER_ENVIRONMENT)?;

        let options = pipeline.options().clone();
        let processed = self.options_apply.process(options, &mut pipeline)?;
        pipeline.replace_options(processed);

        tracing::debug!(
            config_index = index,
            plugin_count = pipeline.attached_plugins().len(),
            "pipeline ready"
        );
        Ok(pipeline)
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("defaulter", &self.defaulter)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Bootstrap with the standard collaborators, without dispatching
pub fn create(raw: &OptionValue) -> Result<PipelineHandle> {
    Bootstrapper::new().create(raw)
}

/// Bootstrap with the standard collaborators and dispatch with `callback`
pub fn launch(raw: &OptionValue, callback: BuildCallback) -> Result<Launched> {
    Bootstrapper::new().launch(raw, callback)
}

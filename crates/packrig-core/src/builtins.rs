//! Built-in plugins implied by a resolved configuration
//!
//! [`OptionsApply`] is the last bootstrap step: it receives the resolved
//! configuration together with the pipeline and attaches whatever the
//! configuration asks for. The bodies of the built-in plugins live with the
//! build backend; here a [`BuiltinPlugin`] only registers its settings.

use crate::errors::Result;
use crate::hooks;
use crate::pipeline::Pipeline;
use crate::plugin::{Plugin, PluginEntry};
use crate::value::{lookup, OptionMap, OptionValue};

/// A named built-in plugin carrying its settings
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinPlugin {
    name: String,
    settings: OptionMap,
}

impl BuiltinPlugin {
    pub fn new(name: impl Into<String>, settings: OptionMap) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &OptionMap {
        &self.settings
    }
}

impl Plugin for BuiltinPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, pipeline: &mut Pipeline) -> anyhow::Result<()> {
        pipeline.register_builtin(self.name.clone(), self.settings.clone());
        Ok(())
    }
}

/// Applies built-in behaviour for a resolved configuration
pub trait OptionsApply: Send + Sync {
    /// Attach built-ins to `pipeline`; returns the (possibly annotated)
    /// configuration the pipeline should own afterwards
    fn process(&self, options: OptionMap, pipeline: &mut Pipeline) -> Result<OptionMap>;
}

/// The standard set of built-ins
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinOptionsApply;

fn section(options: &OptionMap, path: &str) -> OptionMap {
    lookup(options, path)
        .and_then(OptionValue::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Devtool plugin implied by the `devtool` option, with its settings
pub fn devtool_plugin(devtool: Option<&OptionValue>) -> Option<BuiltinPlugin> {
    let devtool = devtool.filter(|d| d.is_truthy())?.as_str()?;
    let mut settings = OptionMap::new();
    settings.insert("devtool".to_string(), OptionValue::from(devtool));
    settings.insert(
        "cheap".to_string(),
        OptionValue::Bool(devtool.contains("cheap")),
    );
    settings.insert(
        "module".to_string(),
        OptionValue::Bool(devtool.contains("module")),
    );

    if devtool.contains("source-map") {
        let name = if devtool.contains("eval") {
            "EvalSourceMapDevToolPlugin"
        } else {
            "SourceMapDevToolPlugin"
        };
        Some(BuiltinPlugin::new(name, settings))
    } else if devtool.contains("eval") {
        Some(BuiltinPlugin::new("EvalDevToolModulePlugin", settings))
    } else {
        None
    }
}

impl OptionsApply for BuiltinOptionsApply {
    fn process(&self, options: OptionMap, pipeline: &mut Pipeline) -> Result<OptionMap> {
        let mut plugins = Vec::new();

        let mut entry = OptionMap::new();
        if let Some(value) = options.get("entry") {
            entry.insert("entry".to_string(), value.clone());
        }
        if let Some(value) = options.get("context") {
            entry.insert("context".to_string(), value.clone());
        }
        pipeline.attach_plugin(&PluginEntry::direct(BuiltinPlugin::new(
            "EntryOptionPlugin",
            entry,
        )))?;
        pipeline.fire(hooks::ENTRY_OPTION)?;

        if let Some(devtool) = devtool_plugin(options.get("devtool")) {
            plugins.push(devtool);
        }
        if lookup(&options, "optimization.splitChunks").is_some_and(|v| v.as_object().is_some()) {
            plugins.push(BuiltinPlugin::new(
                "SplitChunksPlugin",
                section(&options, "optimization.splitChunks"),
            ));
        }
        if lookup(&options, "optimization.runtimeChunk").is_some_and(|v| v.as_object().is_some()) {
            plugins.push(BuiltinPlugin::new(
                "RuntimeChunkPlugin",
                section(&options, "optimization.runtimeChunk"),
            ));
        }
        if lookup(&options, "optimization.noEmitOnErrors") == Some(&OptionValue::Bool(true)) {
            plugins.push(BuiltinPlugin::new("NoEmitOnErrorsPlugin", OptionMap::new()));
        }
        for plugin in plugins {
            pipeline.attach_plugin(&PluginEntry::direct(plugin))?;
        }

        if lookup(&options, "optimization.minimize") == Some(&OptionValue::Bool(true)) {
            let minimizers = lookup(&options, "optimization.minimizer")
                .and_then(OptionValue::as_array)
                .unwrap_or_default();
            for minimizer in minimizers.iter().filter_map(OptionValue::as_plugin) {
                pipeline.attach_plugin(minimizer)?;
            }
        }

        pipeline.fire(hooks::AFTER_PLUGINS)?;
        pipeline.fire(hooks::AFTER_RESOLVERS)?;
        Ok(options)
    }
}

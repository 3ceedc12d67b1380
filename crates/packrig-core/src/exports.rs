//! Named plugin exports
//!
//! An explicit registry of plugin constructors keyed by export name. Retired
//! names stay registered and fail with a fixed message pointing at the
//! replacement option.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builtins::BuiltinPlugin;
use crate::environment::EnvironmentPlugin;
use crate::errors::{PackrigError, Result};
use crate::plugin::PluginEntry;
use crate::value::OptionMap;

type PluginFactory = dyn Fn(&OptionMap) -> PluginEntry + Send + Sync;

const BUILTIN_EXPORTS: &[&str] = &[
    "EntryOptionPlugin",
    "EvalDevToolModulePlugin",
    "EvalSourceMapDevToolPlugin",
    "NoEmitOnErrorsPlugin",
    "SourceMapDevToolPlugin",
    "TerserPlugin",
    "optimize.RuntimeChunkPlugin",
    "optimize.SplitChunksPlugin",
];

/// Registry of plugin constructors and retired export names
#[derive(Clone, Default)]
pub struct ExportRegistry {
    factories: BTreeMap<String, Arc<PluginFactory>>,
    retired: BTreeMap<String, String>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of every built-in export
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("EnvironmentPlugin", |settings| {
            PluginEntry::direct(EnvironmentPlugin::from_settings(settings))
        });
        for &export in BUILTIN_EXPORTS {
            let plugin_name = export.rsplit('.').next().unwrap_or(export).to_string();
            registry.register(export, move |settings| {
                PluginEntry::direct(BuiltinPlugin::new(plugin_name.clone(), settings.clone()))
            });
        }
        registry.retire(
            "optimize.UglifyJsPlugin",
            "webpack.optimize.UglifyJsPlugin has been removed, please use config.optimization.minimize instead.",
        );
        registry.retire(
            "optimize.CommonsChunkPlugin",
            "webpack.optimize.CommonsChunkPlugin has been removed, please use config.optimization.splitChunks instead.",
        );
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&OptionMap) -> PluginEntry + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Mark `name` as removed; looking it up yields `message`
    pub fn retire(&mut self, name: &str, message: &str) -> &mut Self {
        self.factories.remove(name);
        self.retired.insert(name.to_string(), message.to_string());
        self
    }

    /// Construct the plugin exported as `name`
    pub fn create(&self, name: &str, settings: &OptionMap) -> Result<PluginEntry> {
        if let Some(message) = self.retired.get(name) {
            return Err(PackrigError::RemovedPlugin {
                name: name.to_string(),
                message: message.clone(),
            });
        }
        self.factories
            .get(name)
            .map(|factory| factory(settings))
            .ok_or_else(|| PackrigError::UnknownExport {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn is_retired(&self, name: &str) -> bool {
        self.retired.contains_key(name)
    }

    /// Every live export name, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ExportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportRegistry")
            .field("exports", &self.factories.keys().collect::<Vec<_>>())
            .field("retired", &self.retired.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_export_uses_plugin_name() {
        let registry = ExportRegistry::standard();
        let plugin = registry
            .create("optimize.SplitChunksPlugin", &OptionMap::new())
            .unwrap();
        assert_eq!(plugin.name(), "SplitChunksPlugin");
    }

    #[test]
    fn test_retire_replaces_live_export() {
        let mut registry = ExportRegistry::new();
        registry.register("OldPlugin", |settings| {
            PluginEntry::direct(BuiltinPlugin::new("OldPlugin", settings.clone()))
        });
        registry.retire("OldPlugin", "OldPlugin is gone");
        assert!(!registry.contains("OldPlugin"));
        let err = registry.create("OldPlugin", &OptionMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "OldPlugin is gone");
    }
}

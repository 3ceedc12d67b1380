//! Plugin contract
//!
//! A plugin is either a value implementing [`Plugin`] or a bare function that
//! receives the pipeline (the legacy calling convention). Both are normalized
//! into one `apply(pipeline)` call at attachment time.

use std::fmt;
use std::sync::Arc;

use crate::pipeline::Pipeline;

/// A plugin exposing an `apply` capability
pub trait Plugin: Send + Sync {
    /// Name used in logs, errors and the pipeline's attachment record
    fn name(&self) -> &str;

    /// Register hooks and services on the pipeline
    fn apply(&self, pipeline: &mut Pipeline) -> anyhow::Result<()>;
}

type LegacyPluginFn = dyn Fn(&mut Pipeline) -> anyhow::Result<()> + Send + Sync;

/// A plugin entry as it appears in the `plugins` option
#[derive(Clone)]
pub enum PluginEntry {
    Direct(Arc<dyn Plugin>),
    Legacy { name: String, func: Arc<LegacyPluginFn> },
}

impl PluginEntry {
    pub fn direct<P: Plugin + 'static>(plugin: P) -> Self {
        PluginEntry::Direct(Arc::new(plugin))
    }

    pub fn legacy<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Pipeline) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        PluginEntry::Legacy {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PluginEntry::Direct(plugin) => plugin.name(),
            PluginEntry::Legacy { name, .. } => name,
        }
    }

    pub fn apply(&self, pipeline: &mut Pipeline) -> anyhow::Result<()> {
        match self {
            PluginEntry::Direct(plugin) => plugin.apply(pipeline),
            PluginEntry::Legacy { func, .. } => func(pipeline),
        }
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginEntry::Direct(plugin) => write!(f, "Plugin({})", plugin.name()),
            PluginEntry::Legacy { name, .. } => write!(f, "LegacyPlugin({})", name),
        }
    }
}

impl PartialEq for PluginEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PluginEntry::Direct(a), PluginEntry::Direct(b)) => Arc::ptr_eq(a, b),
            (PluginEntry::Legacy { func: a, .. }, PluginEntry::Legacy { func: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

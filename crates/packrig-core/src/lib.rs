//! packrig core - configuration resolution and pipeline bootstrap
//!
//! This crate turns a partial user configuration into a fully resolved one
//! and uses it to stand up a build pipeline, including:
//! - An ordered default-rule engine with ordering-hazard detection
//! - The concrete default rule set for the build configuration surface
//! - Schema validation reporting every violation at once
//! - Pipeline construction, plugin attachment and lifecycle hooks
//! - Run and watch dispatch through a pluggable build backend
//! - A registry of named plugin exports, including retired names

pub mod bootstrap;
pub mod builtins;
pub mod defaults;
pub mod environment;
pub mod errors;
pub mod exports;
pub mod hooks;
pub mod logging_facility;
pub mod pipeline;
pub mod plugin;
pub mod template;
pub mod validation;
pub mod value;

// Used by the logging macros
pub use packrig_core_types as core_types;
#[doc(hidden)]
pub use tracing as __tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use bootstrap::{create, launch, Bootstrapper, Launched, PipelineHandle};
pub use builtins::{BuiltinOptionsApply, BuiltinPlugin, OptionsApply};
pub use defaults::{ConfigDefaulter, OptionsDefaulter};
pub use errors::{PackrigError, Result, RigError, RigErrorKind};
pub use exports::ExportRegistry;
pub use pipeline::{
    BuildBackend, BuildError, BuildSummary, DryRunBackend, MultiPipeline, Pipeline, Stats,
    WatchHandle, WatchOptions,
};
pub use plugin::{Plugin, PluginEntry};
pub use validation::{validate, SchemaValidator, StandardSchemaValidator, ValidationIssue};
pub use value::{OptionMap, OptionValue, Pattern, Shape};

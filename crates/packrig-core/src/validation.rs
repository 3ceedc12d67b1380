//! Raw configuration validation
//!
//! A [`SchemaValidator`] reports every violation it finds; an empty list
//! means the configuration is valid. [`StandardSchemaValidator`] covers the
//! top-level surface the defaults and bootstrap depend on.

use std::fmt;
use std::path::Path;

use crate::value::{OptionMap, OptionValue};

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Validates a raw configuration (mapping or sequence of mappings)
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, raw: &OptionValue) -> Vec<ValidationIssue>;
}

const KNOWN_KEYS: &[&str] = &[
    "amd",
    "bail",
    "cache",
    "context",
    "dependencies",
    "devServer",
    "devtool",
    "entry",
    "externals",
    "infrastructureLogging",
    "loader",
    "mode",
    "module",
    "name",
    "node",
    "optimization",
    "output",
    "parallelism",
    "performance",
    "plugins",
    "profile",
    "recordsInputPath",
    "recordsOutputPath",
    "recordsPath",
    "resolve",
    "resolveLoader",
    "serve",
    "stats",
    "target",
    "watch",
    "watchOptions",
];

const MODES: &[&str] = &["development", "production", "none"];

const TARGETS: &[&str] = &[
    "web",
    "webworker",
    "node",
    "async-node",
    "node-webkit",
    "electron-main",
    "electron-renderer",
    "electron-preload",
];

fn one_of(values: &[&str]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
    format!("should be one of these: {}", quoted.join(" | "))
}

/// Validator for the standard configuration surface
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSchemaValidator;

impl SchemaValidator for StandardSchemaValidator {
    fn validate(&self, raw: &OptionValue) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        match raw {
            OptionValue::Object(config) => check_config(config, "configuration", &mut issues),
            OptionValue::Array(configs) if configs.is_empty() => issues.push(ValidationIssue::new(
                "configuration",
                "should be a non-empty array of configuration objects",
            )),
            OptionValue::Array(configs) => {
                for (index, config) in configs.iter().enumerate() {
                    let prefix = format!("configuration[{index}]");
                    match config {
                        OptionValue::Object(config) => check_config(config, &prefix, &mut issues),
                        other => issues.push(ValidationIssue::new(
                            prefix,
                            format!("should be an object, got {}", other.type_name()),
                        )),
                    }
                }
            }
            other => issues.push(ValidationIssue::new(
                "configuration",
                format!(
                    "should be an object or a non-empty array of objects, got {}",
                    other.type_name()
                ),
            )),
        }
        issues
    }
}

/// Validate with the standard validator
pub fn validate(raw: &OptionValue) -> Vec<ValidationIssue> {
    StandardSchemaValidator.validate(raw)
}

fn check_config(config: &OptionMap, prefix: &str, issues: &mut Vec<ValidationIssue>) {
    let mut report = |field: &str, message: String| {
        let path = if field.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        issues.push(ValidationIssue::new(path, message));
    };

    for key in config.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            report("", format!("has an unknown property '{key}'"));
        }
    }

    if let Some(mode) = config.get("mode") {
        if !mode.as_str().is_some_and(|m| MODES.contains(&m)) {
            report("mode", one_of(MODES));
        }
    }

    if let Some(devtool) = config.get("devtool") {
        if !matches!(devtool, OptionValue::String(_) | OptionValue::Bool(false)) {
            report("devtool", "should be a string or false".to_string());
        }
    }

    if let Some(cache) = config.get("cache") {
        if !matches!(cache, OptionValue::Bool(_) | OptionValue::Object(_)) {
            report("cache", "should be a boolean or an object".to_string());
        }
    }

    if let Some(context) = config.get("context") {
        if !context.as_str().is_some_and(|c| Path::new(c).is_absolute()) {
            report("context", "should be an absolute path".to_string());
        }
    }

    if let Some(entry) = config.get("entry") {
        if let Some(message) = check_entry(entry) {
            report("entry", message);
        }
    }

    if let Some(target) = config.get("target") {
        let valid = match target {
            OptionValue::String(t) => TARGETS.contains(&t.as_str()),
            OptionValue::Function(_) => true,
            _ => false,
        };
        if !valid {
            report("target", format!("{} or a function", one_of(TARGETS)));
        }
    }

    if let Some(watch) = config.get("watch") {
        if watch.as_bool().is_none() {
            report("watch", "should be a boolean".to_string());
        }
    }

    if let Some(watch_options) = config.get("watchOptions") {
        if watch_options.as_object().is_none() {
            report("watchOptions", "should be an object".to_string());
        }
    }

    if let Some(plugins) = config.get("plugins") {
        match plugins.as_array() {
            Some(items) => {
                for (index, item) in items.iter().enumerate() {
                    if item.as_plugin().is_none() {
                        report(
                            &format!("plugins[{index}]"),
                            "should be a plugin instance or function".to_string(),
                        );
                    }
                }
            }
            None => report("plugins", "should be an array".to_string()),
        }
    }

    if let Some(output) = config.get("output") {
        match output.as_object() {
            Some(output) => {
                if let Some(filename) = output.get("filename") {
                    if !matches!(filename, OptionValue::String(_) | OptionValue::Function(_)) {
                        report("output.filename", "should be a string or a function".to_string());
                    }
                }
                if let Some(library) = output.get("library") {
                    let valid = match library {
                        OptionValue::String(_) | OptionValue::Object(_) => true,
                        OptionValue::Array(parts) => parts.iter().all(|p| p.as_str().is_some()),
                        _ => false,
                    };
                    if !valid {
                        report(
                            "output.library",
                            "should be a string, an array of strings or an object".to_string(),
                        );
                    }
                }
            }
            None => report("output", "should be an object".to_string()),
        }
    }

    for field in ["node", "performance"] {
        if let Some(value) = config.get(field) {
            if !matches!(value, OptionValue::Bool(false) | OptionValue::Object(_)) {
                report(field, "should be false or an object".to_string());
            }
        }
    }

    if let Some(optimization) = config.get("optimization") {
        match optimization.as_object() {
            Some(optimization) => {
                if let Some(runtime_chunk) = optimization.get("runtimeChunk") {
                    let valid = match runtime_chunk {
                        OptionValue::Bool(_) | OptionValue::Object(_) => true,
                        OptionValue::String(s) => s == "single" || s == "multiple",
                        _ => false,
                    };
                    if !valid {
                        report(
                            "optimization.runtimeChunk",
                            "should be a boolean, \"single\", \"multiple\" or an object"
                                .to_string(),
                        );
                    }
                }
            }
            None => report("optimization", "should be an object".to_string()),
        }
    }
}

fn non_empty_string(value: &OptionValue) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

fn non_empty_string_list(value: &OptionValue) -> bool {
    value
        .as_array()
        .is_some_and(|items| !items.is_empty() && items.iter().all(non_empty_string))
}

fn check_entry(entry: &OptionValue) -> Option<String> {
    let valid = match entry {
        OptionValue::String(_) => non_empty_string(entry),
        OptionValue::Array(_) => non_empty_string_list(entry),
        OptionValue::Object(chunks) => {
            !chunks.is_empty()
                && chunks
                    .values()
                    .all(|v| non_empty_string(v) || non_empty_string_list(v))
        }
        OptionValue::Function(_) => true,
        _ => false,
    };
    (!valid).then(|| {
        "should be a non-empty string, a non-empty array of strings, an object of entries or a function"
            .to_string()
    })
}

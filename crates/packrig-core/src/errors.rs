use thiserror::Error;

use crate::validation::ValidationIssue;

/// Result type alias using PackrigError
pub type Result<T> = std::result::Result<T, PackrigError>;

/// Error classification with a stable `ERR_*` code per kind
///
/// The code is what log events (`err.code`) and the CLI report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigErrorKind {
    // Configuration
    ConfigValidation,
    InvalidArgument,
    RuleEvaluation,

    // Bootstrap
    PluginApplication,
    HookFailed,

    // Export registry
    RemovedPlugin,
    NotFound,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl RigErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            RigErrorKind::ConfigValidation => "ERR_CONFIG_VALIDATION",
            RigErrorKind::InvalidArgument => "ERR_INVALID_ARGUMENT",
            RigErrorKind::RuleEvaluation => "ERR_RULE_EVALUATION",
            RigErrorKind::PluginApplication => "ERR_PLUGIN_APPLICATION",
            RigErrorKind::HookFailed => "ERR_HOOK_FAILED",
            RigErrorKind::RemovedPlugin => "ERR_REMOVED_PLUGIN",
            RigErrorKind::NotFound => "ERR_NOT_FOUND",
            RigErrorKind::Io => "ERR_IO",
            RigErrorKind::Serialization => "ERR_SERIALIZATION",
            RigErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Flattened view of a [`PackrigError`] for logs and the CLI
#[derive(Debug, Clone)]
pub struct RigError {
    kind: RigErrorKind,
    op: Option<String>,
    subject: Option<String>,
    message: String,
    issues: Vec<String>,
}

impl RigError {
    pub fn new(kind: RigErrorKind) -> Self {
        Self {
            kind,
            op: None,
            subject: None,
            message: String::new(),
            issues: Vec::new(),
        }
    }

    /// Operation the error surfaced in
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the subject (rule path, plugin name, hook name, export name)
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach individual validation issues
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn kind(&self) -> RigErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }
}

impl std::fmt::Display for RigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = self.op() {
            write!(f, " in operation '{op}'")?;
        }
        match (self.message.as_str(), self.subject()) {
            ("", None) => Ok(()),
            ("", Some(subject)) => write!(f, " ({subject})"),
            (message, None) => write!(f, ": {message}"),
            (message, Some(subject)) => write!(f, ": {message} ({subject})"),
        }
    }
}

impl std::error::Error for RigError {}

/// Error taxonomy for configuration resolution and pipeline bootstrap
///
/// Every variant is raised synchronously by the bootstrap call. Build outcomes
/// travel through the completion callback instead (see `pipeline::BuildError`).
#[derive(Error, Debug)]
pub enum PackrigError {
    /// The raw configuration failed schema validation
    #[error("{}", format_validation_issues(.issues))]
    ConfigValidation { issues: Vec<ValidationIssue> },

    /// An argument had the wrong shape
    #[error("Invalid argument: {argument} ({reason})")]
    InvalidArgument { argument: String, reason: String },

    /// A transform or compute rule failed while resolving defaults
    #[error("Failed to resolve default for '{path}': {source}")]
    RuleEvaluation {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// A plugin failed while being attached
    #[error("Plugin '{plugin}' failed to apply: {source}")]
    PluginApplication {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// A hook listener failed while the hook was being fired
    #[error("Listener '{listener}' on hook '{hook}' failed: {source}")]
    HookFailed {
        hook: String,
        listener: String,
        #[source]
        source: anyhow::Error,
    },

    /// A retired export was looked up
    #[error("{message}")]
    RemovedPlugin { name: String, message: String },

    /// An export name is not registered
    #[error("Unknown export: {name}")]
    UnknownExport { name: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_validation_issues(issues: &[ValidationIssue]) -> String {
    let mut message = String::from(
        "Invalid configuration object. The configuration does not match the API schema.",
    );
    for issue in issues {
        message.push_str("\n - ");
        message.push_str(&issue.to_string());
    }
    message
}

impl PackrigError {
    /// Validation issues carried by a `ConfigValidation` error
    pub fn validation_issues(&self) -> &[ValidationIssue] {
        match self {
            PackrigError::ConfigValidation { issues } => issues,
            _ => &[],
        }
    }
}

impl From<&PackrigError> for RigError {
    fn from(err: &PackrigError) -> Self {
        match err {
            PackrigError::ConfigValidation { issues } => {
                RigError::new(RigErrorKind::ConfigValidation)
                    .with_message(format!("{} schema violation(s)", issues.len()))
                    .with_issues(issues.iter().map(ToString::to_string).collect())
            }

            PackrigError::InvalidArgument { argument, reason } => {
                RigError::new(RigErrorKind::InvalidArgument)
                    .with_subject(argument.clone())
                    .with_message(reason.clone())
            }

            PackrigError::RuleEvaluation { path, source } => {
                RigError::new(RigErrorKind::RuleEvaluation)
                    .with_op("apply_defaults")
                    .with_subject(path.clone())
                    .with_message(source.to_string())
            }

            PackrigError::PluginApplication { plugin, source } => {
                RigError::new(RigErrorKind::PluginApplication)
                    .with_op("attach_plugin")
                    .with_subject(plugin.clone())
                    .with_message(source.to_string())
            }

            PackrigError::HookFailed {
                hook,
                listener,
                source,
            } => RigError::new(RigErrorKind::HookFailed)
                .with_op("fire_hook")
                .with_subject(hook.clone())
                .with_message(format!("{}: {}", listener, source)),

            PackrigError::RemovedPlugin { name, message } => {
                RigError::new(RigErrorKind::RemovedPlugin)
                    .with_subject(name.clone())
                    .with_message(message.clone())
            }

            PackrigError::UnknownExport { name } => RigError::new(RigErrorKind::NotFound)
                .with_subject(name.clone())
                .with_message("Export not registered"),

            PackrigError::Io { message } => {
                RigError::new(RigErrorKind::Io).with_message(message.clone())
            }

            PackrigError::Serialization { message } => {
                RigError::new(RigErrorKind::Serialization).with_message(message.clone())
            }

            PackrigError::Internal { message } => {
                RigError::new(RigErrorKind::Internal).with_message(message.clone())
            }
        }
    }
}

impl From<PackrigError> for RigError {
    fn from(err: PackrigError) -> Self {
        RigError::from(&err)
    }
}

impl From<serde_json::Error> for PackrigError {
    fn from(err: serde_json::Error) -> Self {
        PackrigError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PackrigError {
    fn from(err: std::io::Error) -> Self {
        PackrigError::Io {
            message: err.to_string(),
        }
    }
}

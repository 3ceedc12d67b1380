//! Environment plugin
//!
//! Attached to every pipeline before user plugins. It installs the
//! environment services (currently the infrastructure logger configured from
//! `infrastructureLogging`) and taps `beforeRun`.

use std::fmt;
use std::str::FromStr;

use crate::hooks;
use crate::pipeline::Pipeline;
use crate::plugin::Plugin;
use crate::value::{OptionMap, OptionValue};

/// Verbosity of the infrastructure logger, from quietest to loudest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    #[default]
    Info,
    Log,
    Verbose,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Log => "log",
            LogLevel::Verbose => "verbose",
        }
    }

    /// Whether a message at `message_level` passes this threshold
    pub fn allows(&self, message_level: LogLevel) -> bool {
        message_level != LogLevel::None && message_level <= *self
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "false" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "log" => Ok(LogLevel::Log),
            "verbose" | "true" => Ok(LogLevel::Verbose),
            other => Err(format!("unknown infrastructure log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger for infrastructure messages, forwarded to `tracing`
#[derive(Debug, Clone)]
pub struct InfrastructureLogger {
    name: String,
    level: LogLevel,
}

impl InfrastructureLogger {
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Forward `message` at `level`; returns whether it passed the threshold
    pub fn emit(&self, level: LogLevel, message: &str) -> bool {
        if !self.level.allows(level) {
            return false;
        }
        let logger = self.name.as_str();
        match level {
            LogLevel::Error => tracing::error!(logger, "{message}"),
            LogLevel::Warn => tracing::warn!(logger, "{message}"),
            LogLevel::Info => tracing::info!(logger, "{message}"),
            LogLevel::Log => tracing::debug!(logger, "{message}"),
            LogLevel::Verbose => tracing::trace!(logger, "{message}"),
            LogLevel::None => return false,
        }
        true
    }

    pub fn error(&self, message: &str) -> bool {
        self.emit(LogLevel::Error, message)
    }

    pub fn warn(&self, message: &str) -> bool {
        self.emit(LogLevel::Warn, message)
    }

    pub fn info(&self, message: &str) -> bool {
        self.emit(LogLevel::Info, message)
    }

    pub fn log(&self, message: &str) -> bool {
        self.emit(LogLevel::Log, message)
    }

    pub fn verbose(&self, message: &str) -> bool {
        self.emit(LogLevel::Verbose, message)
    }
}

/// Services installed on a pipeline by the environment plugin
#[derive(Debug, Clone)]
pub struct EnvironmentServices {
    pub logger: InfrastructureLogger,
}

/// Plugin installing [`EnvironmentServices`] on a pipeline
#[derive(Debug, Clone, Default)]
pub struct EnvironmentPlugin {
    level: LogLevel,
    debug: bool,
}

impl EnvironmentPlugin {
    pub fn new(level: LogLevel, debug: bool) -> Self {
        Self { level, debug }
    }

    /// Configure from the resolved `infrastructureLogging` block
    ///
    /// An unknown level falls back to `info`; a truthy `debug` raises the
    /// threshold to `verbose`.
    pub fn from_options(infrastructure_logging: Option<&OptionValue>) -> Self {
        let block = infrastructure_logging.and_then(OptionValue::as_object);
        let level = block
            .and_then(|b| b.get("level"))
            .and_then(OptionValue::as_str)
            .and_then(|l| l.parse().ok())
            .unwrap_or_default();
        let debug = block.and_then(|b| b.get("debug")).is_some_and(OptionValue::is_truthy);
        Self::new(level, debug)
    }

    /// Build from plugin settings, as the export registry does
    pub fn from_settings(settings: &OptionMap) -> Self {
        Self::from_options(Some(&OptionValue::Object(settings.clone())))
    }

    pub fn effective_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Verbose
        } else {
            self.level
        }
    }
}

impl Plugin for EnvironmentPlugin {
    fn name(&self) -> &str {
        "EnvironmentPlugin"
    }

    fn apply(&self, pipeline: &mut Pipeline) -> anyhow::Result<()> {
        let logger = InfrastructureLogger::new("packrig.infrastructure", self.effective_level());
        pipeline.set_environment(EnvironmentServices {
            logger: logger.clone(),
        });

        let context = pipeline.context().display().to_string();
        pipeline.hooks_mut().tap(hooks::BEFORE_RUN, "EnvironmentPlugin", move || {
            logger.log(&format!("starting build in {context}"));
            Ok(())
        });
        Ok(())
    }
}

//! Default resolution
//!
//! [`engine`] is the generic ordered rule evaluator; [`config`] declares the
//! concrete rule set for the build configuration surface.

pub mod config;
pub mod engine;

pub use config::ConfigDefaulter;
pub use engine::{OptionsDefaulter, OrderingHazard, Rule, RuleKind};

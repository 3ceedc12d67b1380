//! Structured logging for packrig
//!
//! `init(profile)` installs the subscriber once per process. Operations log
//! their boundaries with `log_op_start!`, `log_op_end!` and `log_op_error!`,
//! which `test_capture` can record for assertions.
//!
//! ```rust
//! use packrig_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

//! Operation boundary macros
//!
//! Every boundary event carries `component` (the calling module), `op` and
//! `event`. Extra fields follow `tracing` field syntax.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $op:expr, $event:expr $(, $($field:tt)*)?) => {
        $crate::__tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event
            $(, $($field)*)?
        )
    };
}

/// Log that `op` has started
///
/// ```
/// # use packrig_core::log_op_start;
/// log_op_start!("apply_defaults");
/// log_op_start!("bootstrap", config_count = 2);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::core_types::schema::EVENT_START
            $(, $($field)*)?
        )
    };
}

/// Log that `op` finished; `duration_ms` is mandatory
///
/// ```
/// # use packrig_core::log_op_end;
/// log_op_end!("apply_defaults", duration_ms = 3, rule_count = 120);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Log that `op` failed with `err`
///
/// `err` is anything `RigError` converts from by reference; it is only
/// borrowed. The event carries `err.kind` and `err.code`.
///
/// ```
/// # use packrig_core::{log_op_error, errors::PackrigError};
/// let err = PackrigError::UnknownExport { name: "FooPlugin".to_string() };
/// log_op_error!("lookup_export", err, duration_ms = 0);
/// assert_eq!(err.to_string(), "Unknown export: FooPlugin");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let rig_err = $crate::errors::RigError::from(&$err);
        $crate::__log_op_event!(
            error,
            $op,
            $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?rig_err.kind(),
            err.code = rig_err.code()
            $(, $($field)*)?
        );
    }};
}

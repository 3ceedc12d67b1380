//! Field keys and event names shared by the logging macros, the error
//! facility and the capture layer

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_RULE_PATH: &str = "rule_path";
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

/// Operation boundaries, in the order an operation can emit them
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

/// Whether `event` closes an operation, successfully or not
pub fn is_terminal_event(event: &str) -> bool {
    event == EVENT_END || event == EVENT_END_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_end_events_are_terminal() {
        assert!(!is_terminal_event(EVENT_START));
        assert!(is_terminal_event(EVENT_END));
        assert!(is_terminal_event(EVENT_END_ERROR));
        assert!(!is_terminal_event("progress"));
    }
}

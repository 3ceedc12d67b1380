//! In-memory event capture for logging assertions
//!
//! `init_test_capture()` installs a global subscriber that records every
//! event's fields as strings. Tests in one binary share the capture, so
//! assertions filter by op name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use packrig_core_types::schema::{is_terminal_event, FIELD_COMPONENT, FIELD_EVENT, FIELD_OP};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One recorded event
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub component: Option<String>,
    pub op: Option<String>,
    pub event: Option<String>,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    /// Whether this is the `event` boundary of `op`
    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op.as_deref() == Some(op) && self.event.as_deref() == Some(event)
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Default)]
struct Fields(HashMap<String, String>);

// Integers and booleans reach `record_debug` through the trait defaults and
// render the same as their Display form.
impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

type Sink = Arc<Mutex<Vec<CapturedEvent>>>;

// A test that panics mid-event must not hide the events of later tests.
fn events_of(sink: &Sink) -> MutexGuard<'_, Vec<CapturedEvent>> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Layer appending every event to a shared sink
pub struct TestCaptureLayer {
    sink: Sink,
}

impl TestCaptureLayer {
    pub fn new() -> (Self, TestCapture) {
        let sink = Sink::default();
        (Self { sink: sink.clone() }, TestCapture { sink })
    }
}

impl<S> Layer<S> for TestCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let fields = fields.0;

        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            component: fields.get(FIELD_COMPONENT).cloned(),
            op: fields.get(FIELD_OP).cloned(),
            event: fields.get(FIELD_EVENT).cloned(),
            fields,
        };
        events_of(&self.sink).push(captured);
    }
}

/// Read handle over the captured events
#[derive(Clone)]
pub struct TestCapture {
    sink: Sink,
}

impl TestCapture {
    /// Snapshot of everything captured so far
    pub fn events(&self) -> Vec<CapturedEvent> {
        events_of(&self.sink).clone()
    }

    /// Events for one operation, in emission order
    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| e.op.as_deref() == Some(op))
    }

    /// First `event` boundary of `op`
    pub fn find(&self, op: &str, event: &str) -> Option<CapturedEvent> {
        self.filtered(|e| e.is(op, event)).into_iter().next()
    }

    /// Terminal events (`end` or `end_error`) recorded for `op`
    pub fn outcomes(&self, op: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| {
            e.op.as_deref() == Some(op) && e.event.as_deref().is_some_and(is_terminal_event)
        })
    }

    /// # Panics
    ///
    /// Panics when no `event` boundary of `op` was captured.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let captured = self.events();
        assert!(
            captured.iter().any(|e| e.is(op, event)),
            "Expected event op={op} event={event} among {} captured events",
            captured.len()
        );
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.filtered(predicate).len()
    }

    pub fn clear(&self) {
        events_of(&self.sink).clear();
    }

    fn filtered<F>(&self, predicate: F) -> Vec<CapturedEvent>
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        events_of(&self.sink)
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture subscriber (once) and return the shared handle
///
/// ```
/// use packrig_core::logging_facility::test_capture::init_test_capture;
/// use packrig_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_op");
/// capture.assert_event_exists("doc_capture_op", "start");
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let (layer, capture) = TestCaptureLayer::new();
            tracing_subscriber::registry().with(layer).try_init().ok();
            capture
        })
        .clone()
}

//! Tracing layer that forwards events into a tokio channel.
//!
//! Hosts use it to surface store diagnostics (null-input warnings, swallowed
//! close failures) somewhere other than the log; tests use it to assert on
//! them.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// One captured tracing event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiagnosticEvent {
    /// Event target (e.g., "configurator_reactive::store")
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    /// The `[Component]` tag leading the message, without brackets.
    pub component: Option<String>,
    pub message: String,
    /// Structured fields other than the message
    pub fields: HashMap<String, Value>,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl DiagnosticEvent {
    pub fn is_warning(&self) -> bool {
        self.level == tracing::Level::WARN.to_string()
    }
}

pub struct DiagnosticEventLayer {
    sender: mpsc::UnboundedSender<DiagnosticEvent>,
}

impl DiagnosticEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<DiagnosticEvent>) -> Self {
        Self { sender }
    }
}

/// A layer together with the receiving end of its channel.
pub fn capture() -> (DiagnosticEventLayer, mpsc::UnboundedReceiver<DiagnosticEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (DiagnosticEventLayer::new(sender), receiver)
}

impl<S> Layer<S> for DiagnosticEventLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorded = RecordedFields::default();
        event.record(&mut recorded);

        let metadata = event.metadata();
        let diagnostic = DiagnosticEvent {
            target: metadata.target().to_string(),
            level: metadata.level().to_string(),
            component: component_of(&recorded.message).map(str::to_string),
            message: recorded.message,
            fields: recorded.fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(diagnostic);
    }
}

/// `"[Store] text"` yields `Some("Store")`.
fn component_of(message: &str) -> Option<&str> {
    let (tag, _) = message.strip_prefix('[')?.split_once(']')?;
    (!tag.is_empty()).then_some(tag)
}

/// Splits the formatted message from the structured fields. Our call sites
/// only log strings, integers, booleans and `Debug` values.
#[derive(Default)]
struct RecordedFields {
    message: String,
    fields: HashMap<String, Value>,
}

impl RecordedFields {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordedFields {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.insert(field, Value::String(rendered));
        }
    }
}

//! `tracing` layer that tees every event into the hub as JSON.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::hub::LogHub;

/// Serializes events to one JSON line each and broadcasts them.
///
/// Sits beside the primary fmt layer in the subscriber stack; the primary
/// sink always writes first (layers run in registration order), and a
/// record that fails to serialize is silently skipped rather than failing
/// the log call.
pub struct BroadcastLayer {
    hub: LogHub,
}

impl BroadcastLayer {
    pub fn new(hub: LogHub) -> Self {
        Self { hub }
    }
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = Map::new();
        record.insert(
            "time".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert(
            "level".to_string(),
            json!(event.metadata().level().to_string()),
        );
        record.insert("msg".to_string(), json!(visitor.message));
        for (key, value) in visitor.fields {
            record.insert(key, value);
        }

        if let Ok(line) = serde_json::to_string(&Value::Object(record)) {
            self.hub.broadcast(line);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, Value)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            if let Value::String(s) = value {
                self.message = s;
            } else {
                self.message = value.to_string();
            }
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, json!(format!("{value:?}")));
    }
}

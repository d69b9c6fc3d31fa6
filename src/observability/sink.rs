//! Structured JSON log sink.
//!
//! # Responsibilities
//! - Serialize every event as one JSON object per line
//! - Rename well-known fields for the Cloud Logging agent
//!   (see <https://cloud.google.com/logging/docs/structured-logging#special-payload-fields>)
//! - Inject the request correlation id from the enclosing span
//! - Drop events below the configured severity
//!
//! # Record Shape
//! ```text
//! {"time": "...", "severity": "INFO", "message": "...",
//!  "logging.googleapis.com/sourceLocation": {"file": "...", "line": 42, "function": "..."},
//!  "request_id": "...", <event fields>}
//! ```
//!
//! `tracing` callsites carry no function name, so `function` holds the
//! emitting module path (`service_scaffold::http::server`).

use std::fmt;
use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{span, Event, Level, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::observability::severity::{Severity, CRITICAL_FIELD};

pub const TIME_KEY: &str = "time";
pub const SEVERITY_KEY: &str = "severity";
pub const MESSAGE_KEY: &str = "message";
pub const SOURCE_LOCATION_KEY: &str = "logging.googleapis.com/sourceLocation";
/// Span field and record key carrying the correlation id.
pub const REQUEST_ID_KEY: &str = "request_id";

/// `tracing` layer writing Cloud Logging structured records.
pub struct CloudLogLayer<W> {
    threshold: Severity,
    make_writer: W,
    source_location: bool,
}

impl<W> CloudLogLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    /// Create a sink dropping everything below `threshold`.
    pub fn new(threshold: Severity, make_writer: W) -> Self {
        Self {
            threshold,
            make_writer,
            source_location: true,
        }
    }

    /// Toggle the source location entry (on by default).
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    fn render(&self, event: &Event<'_>, fields: FieldVisitor, severity: Severity, request_id: Option<String>) -> Value {
        let meta = event.metadata();
        let mut record = fields.values;

        record.insert(
            TIME_KEY.to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        record.insert(SEVERITY_KEY.to_string(), Value::from(severity.as_str()));
        record.insert(
            MESSAGE_KEY.to_string(),
            Value::from(fields.message.unwrap_or_default()),
        );

        if self.source_location {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                record.insert(
                    SOURCE_LOCATION_KEY.to_string(),
                    serde_json::json!({
                        "file": file,
                        "line": line,
                        "function": meta.module_path().unwrap_or_else(|| meta.target()),
                    }),
                );
            }
        }

        if let Some(id) = request_id {
            record.insert(REQUEST_ID_KEY.to_string(), Value::from(id));
        }

        Value::Object(record)
    }
}

/// Correlation id stored in span extensions.
struct CorrelationId(String);

impl<S, W> Layer<S> for CloudLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Never cache: scoped subscribers with different thresholds may share
        // callsites, so `enabled` decides per event.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.is_enabled(metadata)
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = RequestIdVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(request_id), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(CorrelationId(request_id));
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = RequestIdVisitor::default();
        values.record(&mut visitor);
        let (Some(request_id), Some(span)) = (visitor.0, ctx.span(id)) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        // First id wins for the lifetime of the span.
        if extensions.get_mut::<CorrelationId>().is_none() {
            extensions.insert(CorrelationId(request_id));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut fields = FieldVisitor::default();
        event.record(&mut fields);

        let severity = if fields.critical && *meta.level() == Level::ERROR {
            Severity::Critical
        } else {
            Severity::from_level(meta.level())
        };
        if severity < self.threshold {
            return;
        }

        let request_id = ctx.event_scope(event).and_then(|scope| {
            scope.from_root().fold(None, |found, span| {
                span.extensions()
                    .get::<CorrelationId>()
                    .map(|id| id.0.clone())
                    .or(found)
            })
        });

        let record = self.render(event, fields, severity, request_id);
        let Ok(mut line) = serde_json::to_vec(&record) else {
            return;
        };
        line.push(b'\n');

        let mut writer = self.make_writer.make_writer_for(meta);
        let _ = writer.write_all(&line);
    }
}

impl<W> CloudLogLayer<W> {
    fn is_enabled(&self, metadata: &Metadata<'_>) -> bool {
        if metadata.is_span() {
            // Spans carry the correlation id even when their level is filtered.
            return true;
        }
        Severity::from_level(metadata.level()) >= self.threshold.min(Severity::Error)
    }
}

/// Collects event fields into a JSON map.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    critical: bool,
    values: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == MESSAGE_KEY {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.values.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
            return;
        }
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// Picks the `request_id` field out of span attributes.
#[derive(Default)]
struct RequestIdVisitor(Option<String>);

impl Visit for RequestIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == REQUEST_ID_KEY && !value.is_empty() {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == REQUEST_ID_KEY {
            let rendered = format!("{:?}", value);
            if !rendered.is_empty() {
                self.0 = Some(rendered);
            }
        }
    }
}

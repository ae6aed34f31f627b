//! Fire-and-forget telemetry.
//!
//! Request handlers only ever enqueue events on a bounded channel. A separate
//! dispatcher task drains the channel into a [`TelemetryExporter`]; a slow or
//! failing exporter fills the channel and further events are dropped, so the
//! response path never waits on the backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry export failed: {0}")]
    Export(String),
}

/// Ids shared by every event recorded while handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
}

impl TraceContext {
    /// Starts a fresh trace with no parent.
    pub fn root() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
        }
    }

    fn child(&self) -> Self {
        Self {
            context: self.context,
            parent_span_id: self.parent_span_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Log {
        message: String,
        #[serde(flatten)]
        context: TraceContext,
        attributes: Attributes,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    Span {
        name: String,
        #[serde(flatten)]
        context: TraceContext,
        parent_span_id: Option<Uuid>,
        attributes: Attributes,
        #[serde(with = "time::serde::rfc3339")]
        started_at: OffsetDateTime,
        duration_us: u64,
    },
    Custom {
        name: String,
        #[serde(flatten)]
        context: TraceContext,
        attributes: Attributes,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &str {
        match self {
            TelemetryEvent::Log { message, .. } => message,
            TelemetryEvent::Span { name, .. } | TelemetryEvent::Custom { name, .. } => name,
        }
    }

    pub fn context(&self) -> &TraceContext {
        match self {
            TelemetryEvent::Log { context, .. }
            | TelemetryEvent::Span { context, .. }
            | TelemetryEvent::Custom { context, .. } => context,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            TelemetryEvent::Log { attributes, .. }
            | TelemetryEvent::Span { attributes, .. }
            | TelemetryEvent::Custom { attributes, .. } => attributes,
        }
    }
}

#[rocket::async_trait]
pub trait TelemetryExporter: Send + Sync + 'static {
    async fn export(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Writes every event as a structured log line.
pub struct TracingExporter;

#[rocket::async_trait]
impl TelemetryExporter for TracingExporter {
    async fn export(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(event).map_err(|e| TelemetryError::Export(e.to_string()))?;
        info!(target: "telemetry", event = event.name(), %payload);
        Ok(())
    }
}

pub fn attributes<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Attributes
where
    K: Into<String>,
    V: ToString,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect()
}

#[derive(Clone)]
pub struct Telemetry {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl Telemetry {
    /// Handle plus the receiving end, for callers that drive dispatch
    /// themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Must be called from within a Tokio runtime.
    pub fn spawn<E: TelemetryExporter>(exporter: E, capacity: usize) -> (Self, JoinHandle<()>) {
        let (telemetry, rx) = Self::channel(capacity);
        let handle = tokio::spawn(dispatch(rx, Arc::new(exporter)));
        (telemetry, handle)
    }

    pub fn log_event(&self, context: &TraceContext, message: impl Into<String>, attributes: Attributes) {
        self.emit(TelemetryEvent::Log {
            message: message.into(),
            context: *context,
            attributes,
            at: OffsetDateTime::now_utc(),
        });
    }

    pub fn custom_event(&self, context: &TraceContext, name: impl Into<String>, attributes: Attributes) {
        self.emit(TelemetryEvent::Custom {
            name: name.into(),
            context: *context,
            attributes,
            at: OffsetDateTime::now_utc(),
        });
    }

    /// Without a parent the span starts a new trace; with one it joins the
    /// parent's trace and records the parent's span id.
    pub fn start_span(&self, name: impl Into<String>, parent: Option<&TraceContext>) -> SpanGuard {
        let (context, parent_span_id) = match parent {
            Some(parent) => (parent.child(), Some(parent.span_id)),
            None => (TraceContext::root(), None),
        };
        SpanGuard {
            telemetry: self.clone(),
            name: name.into(),
            context,
            parent_span_id,
            attributes: Attributes::new(),
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
            finished: false,
        }
    }

    fn emit(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(event = event.name(), "Telemetry buffer full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event = event.name(), "Telemetry dispatcher stopped, dropping event");
            }
        }
    }
}

/// Records its span when [`SpanGuard::end`] is called or when dropped.
pub struct SpanGuard {
    telemetry: Telemetry,
    name: String,
    context: TraceContext,
    parent_span_id: Option<Uuid>,
    attributes: Attributes,
    started_at: OffsetDateTime,
    started: Instant,
    finished: bool,
}

impl SpanGuard {
    pub fn context(&self) -> TraceContext {
        self.context
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attributes.insert(key.into(), value.to_string());
    }

    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let duration_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.telemetry.emit(TelemetryEvent::Span {
            name: std::mem::take(&mut self.name),
            context: self.context,
            parent_span_id: self.parent_span_id,
            attributes: std::mem::take(&mut self.attributes),
            started_at: self.started_at,
            duration_us,
        });
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

async fn dispatch(mut rx: mpsc::Receiver<TelemetryEvent>, exporter: Arc<dyn TelemetryExporter>) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = exporter.export(&event).await {
            debug!(event = event.name(), error = %e, "Dropping telemetry event");
        }
    }
    debug!("Telemetry dispatcher stopped");
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[rocket::async_test]
    async fn events_reach_the_queue_in_order() {
        let (telemetry, mut rx) = Telemetry::channel(8);
        let ctx = TraceContext::root();
        telemetry.log_event(&ctx, "Cats Vote", attributes([("Cats Vote", 3)]));
        telemetry.custom_event(&ctx, "Dogs Vote", attributes([("vote", "Dogs")]));
        telemetry.start_span("GET /", None).end();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], TelemetryEvent::Log { message, .. } if message == "Cats Vote"));
        assert_eq!(events[0].attributes().get("Cats Vote").map(String::as_str), Some("3"));
        assert!(matches!(&events[1], TelemetryEvent::Custom { name, .. } if name == "Dogs Vote"));
        assert!(matches!(&events[2], TelemetryEvent::Span { name, .. } if name == "GET /"));
        assert_eq!(events[0].context(), &ctx);
        assert_eq!(events[1].context(), &ctx);
    }

    #[rocket::async_test]
    async fn child_spans_join_the_parent_trace() {
        let (telemetry, mut rx) = Telemetry::channel(8);
        let root = telemetry.start_span("GET /", None);
        let parent = root.context();
        telemetry.start_span("Cats Vote", Some(&parent)).end();
        telemetry.start_span("Dogs Vote", Some(&parent)).end();
        root.end();
        telemetry.start_span("GET /", None).end();

        let spans: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Span { name, context, parent_span_id, .. } => Some((name, context, parent_span_id)),
                _ => None,
            })
            .collect();
        assert_eq!(spans.len(), 4);

        for (_, context, parent_span_id) in &spans[..2] {
            assert_eq!(context.trace_id, parent.trace_id);
            assert_ne!(context.span_id, parent.span_id);
            assert_eq!(*parent_span_id, Some(parent.span_id));
        }
        assert_ne!(spans[0].1.span_id, spans[1].1.span_id);
        assert_eq!(spans[2].1, parent);
        assert_eq!(spans[2].2, None);
        assert_ne!(spans[3].1.trace_id, parent.trace_id);
    }

    #[rocket::async_test]
    async fn dropped_span_guard_is_recorded_once() {
        let (telemetry, mut rx) = Telemetry::channel(8);
        {
            let mut span = telemetry.start_span("Cats Vote", None);
            span.set_attribute("option", "Cats");
        }
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attributes().get("option").map(String::as_str), Some("Cats"));
    }

    #[rocket::async_test]
    async fn full_buffer_drops_without_blocking() {
        let (telemetry, mut rx) = Telemetry::channel(1);
        let ctx = TraceContext::root();
        telemetry.log_event(&ctx, "first", Attributes::new());
        telemetry.log_event(&ctx, "second", Attributes::new());
        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["first"]);
    }

    #[rocket::async_test]
    async fn closed_dispatcher_is_ignored() {
        let (telemetry, rx) = Telemetry::channel(4);
        drop(rx);
        telemetry.log_event(&TraceContext::root(), "orphan", Attributes::new());
        telemetry.start_span("orphan span", None).end();
    }

    #[rocket::async_test]
    async fn dispatcher_exports_and_survives_failures() {
        let ctx = TraceContext::root();
        let recorder = RecordingExporter::default();
        let (telemetry, handle) = Telemetry::spawn(recorder.clone(), 16);
        telemetry.custom_event(&ctx, "Cats Vote", attributes([("vote", "Cats")]));
        drop(telemetry);
        handle.await.unwrap();
        assert_eq!(recorder.names(), vec!["Cats Vote"]);

        let (telemetry, handle) = Telemetry::spawn(FailingExporter, 16);
        telemetry.log_event(&ctx, "lost", Attributes::new());
        telemetry.log_event(&ctx, "also lost", Attributes::new());
        drop(telemetry);
        handle.await.unwrap();
    }

    #[rocket::async_test]
    async fn tracing_exporter_serializes_events() {
        let context = TraceContext {
            trace_id: Uuid::from_u128(1),
            span_id: Uuid::from_u128(2),
        };
        let event = TelemetryEvent::Custom {
            name: "Cats Vote".into(),
            context,
            attributes: attributes([("vote", "Cats")]),
            at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(TracingExporter.export(&event).await.is_ok());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "custom");
        assert_eq!(json["attributes"]["vote"], "Cats");
        assert_eq!(json["at"], "1970-01-01T00:00:00Z");
        assert_eq!(json["trace_id"], "00000000-0000-0000-0000-000000000001");
        assert_eq!(json["span_id"], "00000000-0000-0000-0000-000000000002");
    }
}

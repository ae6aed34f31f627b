use std::convert::Infallible;
use std::sync::Mutex;
use std::time::Instant;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::request::{FromRequest, Outcome};
use rocket::{Data, Request, Response};
use tracing::info;

use crate::metrics;
use crate::telemetry::{SpanGuard, Telemetry, TraceContext};

/// Records one telemetry span per request, named `"{METHOD} {path}"`, with
/// the response status attached. Spans opened by handlers join its trace
/// through the [`TraceContext`] request guard.
pub struct RequestTrace {
    telemetry: Telemetry,
}

impl RequestTrace {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }
}

struct RequestSpan {
    context: TraceContext,
    started: Instant,
    guard: Mutex<Option<SpanGuard>>,
}

impl RequestSpan {
    /// Used when the fairing is not attached.
    fn detached() -> Self {
        Self {
            context: TraceContext::root(),
            started: Instant::now(),
            guard: Mutex::new(None),
        }
    }
}

#[rocket::async_trait]
impl Fairing for RequestTrace {
    fn info(&self) -> Info {
        Info {
            name: "Request trace",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let name = format!("{} {}", req.method(), req.uri().path());
        let span = self.telemetry.start_span(name, None);
        let context = span.context();
        req.local_cache(move || RequestSpan {
            context,
            started: Instant::now(),
            guard: Mutex::new(Some(span)),
        });
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let status = res.status().code;
        let request_span = req.local_cache(RequestSpan::detached);
        let method = req.method().as_str();
        info!(
            method,
            path = %req.uri().path(),
            status,
            trace_id = %request_span.context.trace_id,
            "Handled request"
        );
        metrics::record_request(method, status, request_span.started.elapsed());

        let span = request_span.guard.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut span) = span {
            span.set_attribute("http.method", method);
            span.set_attribute("http.status_code", status);
            span.end();
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TraceContext {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestSpan::detached).context)
    }
}

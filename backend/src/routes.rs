use std::sync::Arc;

use rocket::{State, get, post, form::Form};
use rocket_dyn_templates::Template;
use shared::VoteForm;
use tracing::instrument;

use crate::config::Settings;
use crate::error::ApiError;
use crate::service::VoteService;
use crate::store::CounterStore;
use crate::telemetry::{Telemetry, TraceContext};

pub const INDEX_TEMPLATE: &str = "index";

/// Everything a request needs, built once at startup and managed by Rocket.
pub struct AppState {
    pub service: VoteService,
    pub telemetry: Telemetry,
}

impl AppState {
    pub fn new(settings: &Settings, store: Arc<dyn CounterStore>, telemetry: Telemetry) -> Self {
        Self {
            service: VoteService::new(settings, store, telemetry.clone()),
            telemetry,
        }
    }
}

#[instrument(skip(state, trace), fields(trace_id = %trace.trace_id))]
#[get("/")]
pub async fn index(state: &State<AppState>, trace: TraceContext) -> Result<Template, ApiError> {
    let view = state.service.current(&trace).await?;
    Ok(Template::render(INDEX_TEMPLATE, &view))
}

#[instrument(skip(state, trace, form), fields(vote = ?form.vote, trace_id = %trace.trace_id))]
#[post("/", data = "<form>")]
pub async fn submit(
    state: &State<AppState>,
    trace: TraceContext,
    form: Form<VoteForm>,
) -> Result<Template, ApiError> {
    let view = state.service.submit(&form, &trace).await?;
    Ok(Template::render(INDEX_TEMPLATE, &view))
}

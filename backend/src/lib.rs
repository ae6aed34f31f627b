pub mod catchers;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod trace;
pub mod utils;

pub use shared::{PageView, Tally, VoteAction, VoteForm, VoteOptions};

use std::sync::Arc;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use tracing::info;

use crate::{
    catchers::{bad_request, internal_error, not_found, service_unavailable, unprocessable},
    config::Settings,
    routes::{index, submit, AppState},
    store::{initialize_counters, CounterStore, StoreError},
    telemetry::Telemetry,
    trace::RequestTrace,
};

/// Default `template_dir`; `ROCKET_TEMPLATE_DIR` takes precedence.
pub const TEMPLATE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

/// Checks the store and seeds missing counters. Nothing is served until this
/// succeeds.
pub async fn prepare(
    settings: &Settings,
    store: Arc<dyn CounterStore>,
    telemetry: Telemetry,
) -> Result<AppState, StoreError> {
    store.ping().await?;
    initialize_counters(store.as_ref(), &settings.options).await?;
    info!("📋 Counters ready for {} / {}", settings.options.first, settings.options.second);
    Ok(AppState::new(settings, store, telemetry))
}

pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let figment = rocket::Config::figment().join(("template_dir", TEMPLATE_DIR));

    rocket::custom(figment)
        .attach(Template::fairing())
        .attach(RequestTrace::new(state.telemetry.clone()))
        .manage(state)
        .mount("/", rocket::routes![index, submit])
        .register(
            "/",
            rocket::catchers![
                bad_request,
                not_found,
                unprocessable,
                internal_error,
                service_unavailable
            ],
        )
}

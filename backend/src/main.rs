use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vote_backend::{
    build_rocket,
    config::Settings,
    metrics,
    prepare,
    store::RedisStore,
    telemetry::{Telemetry, TracingExporter},
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[rocket::main]
async fn main() -> ExitCode {
    init_tracing();
    info!("🚀 Starting vote server");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("✗ Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(addr) = settings.metrics_addr {
        if let Err(e) = metrics::install(addr) {
            error!("✗ Failed to start metrics exporter on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    }

    let store = match RedisStore::connect(&settings.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("✗ Counter store unreachable at {}:{}: {}", settings.store.host, settings.store.port, e);
            return ExitCode::FAILURE;
        }
    };

    let (telemetry, _dispatcher) = Telemetry::spawn(TracingExporter, settings.telemetry_buffer);

    let state = match prepare(&settings, Arc::new(store), telemetry).await {
        Ok(state) => state,
        Err(e) => {
            error!("✗ Failed to initialize counters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match build_rocket(state).launch().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

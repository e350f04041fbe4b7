use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Env;

/// init
///
/// Installs the global tracing subscriber. The log level prioritizes the RUST_LOG
/// environment variable, falling back to a sensible default. The output format is
/// selected by environment: pretty printing for human readability locally, JSON for
/// ingestion by centralized log aggregators in production.
///
/// Safe to call more than once (later calls are no-ops), so test binaries can install
/// it without coordinating.
pub fn init(env: &Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "news_portal=debug".into());

    let result = match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if result.is_ok() {
        tracing::info!("telemetry initialized in {:?} mode", env);
    }
}

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

const CRATE: &str = env!("CARGO_CRATE_NAME");

/// Filter used when `RUST_LOG` is unset
fn default_directives(env: Environment) -> String {
    let (own, http) = match env {
        Environment::Dev => ("debug", "debug"),
        Environment::Staging => ("debug", "info"),
        Environment::Prod => ("info", "info"),
    };
    let fallback = if env.is_prod() { "warn" } else { "info" };
    format!("{CRATE}={own},tower_http={http},sqlx=warn,{fallback}")
}

/// Install the global subscriber. Production emits one JSON object per event
/// with span fields flattened in, so `team_id`/`task_id` land at the top level.
pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(*env)));

    let registry = tracing_subscriber::registry().with(filter);
    if env.is_prod() {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(env.is_dev())
                    .with_line_number(env.is_dev()),
            )
            .init();
    }

    tracing::info!(env = ?env, "logging initialized");
}

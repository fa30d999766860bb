use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; `log_json` switches to
/// structured JSON output. Safe to call once per process; tests use
/// `try_init` semantics via [`init_for_tests`].
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

/// Best-effort subscriber for tests; ignores the error when one is already
/// installed.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::config::AppConfig;

/// Installs the global tracing subscriber according to the configured log
/// format. Repeat initialization is a no-op.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .ok();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .ok();
    }
}

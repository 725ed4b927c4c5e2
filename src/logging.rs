use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dependencies that are chatty below `warn`
const QUIET_DEPENDENCIES: &[&str] = &["sqlx", "hyper", "hyper_util", "reqwest"];

/// Default directives: the configured level applies to this crate, other
/// crates stay at `info` and the listed dependencies at `warn`
pub fn default_filter(level: &str) -> String {
    let mut directives = vec![
        "info".to_string(),
        format!("{}={}", env!("CARGO_CRATE_NAME"), level),
    ];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|dep| format!("{}=warn", dep)));
    directives.join(",")
}

/// Install the global subscriber; keep the guard alive until exit
///
/// `RUST_LOG`, when set, replaces the default directives.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // request_id and friends stay queryable as JSON fields
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target of the per-pair records (skips, unrouted pairs, tie-breaks).
/// A large snapshot emits thousands of these.
pub const TARGET_RECORD: &str = "REFINERY::RECORD";

/// Filter directive built from the config; `RUST_LOG` still wins.
pub fn filter_directive(config: &AppConfig) -> String {
    if config.record_logs {
        config.log_level.clone()
    } else {
        format!("{},{}=off", config.log_level, TARGET_RECORD)
    }
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered file records are lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Target kept: record lines are selected by it downstream
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer).with_ansi(false))
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_ansi(false);
        // stdout is reserved for the run summary
        let console_layer = fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_writer(std::io::stderr);
        registry.with(file_layer).with(console_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "
log_level: debug
log_dir: ./logs
log_file: quote_refinery.log
use_json: false
rotation: never
";

    #[test]
    fn test_record_target_on_by_default() {
        let config = AppConfig::from_yaml_str(BASE).unwrap();
        assert!(config.record_logs);
        assert_eq!(filter_directive(&config), "debug");
    }

    #[test]
    fn test_record_target_can_be_silenced() {
        let config = AppConfig::from_yaml_str(&format!("{BASE}record_logs: false\n")).unwrap();
        assert_eq!(filter_directive(&config), "debug,REFINERY::RECORD=off");
        // Directive must parse
        assert!(EnvFilter::try_new(filter_directive(&config)).is_ok());
    }
}

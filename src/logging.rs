//! Structured logging configuration
//!
//! JSON output for unattended runs, pretty formatting for interactive use,
//! console/file/both outputs, all selected through [`crate::config`]. The
//! file appender's worker guard is returned to the caller - it must stay
//! alive for the duration of the run or buffered log lines are lost.

use crate::config::get_config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use uuid::Uuid;

const LOG_FILE_PREFIX: &str = "gcp-price-sync.log";

/// Initialize the logging system based on configuration. Returns the file
/// appender guard when file output is active.
pub fn init_logging() -> Option<WorkerGuard> {
    let config = get_config();

    let log_level = &config.logging.level;
    let log_output = &config.logging.output;
    let log_format = &config.logging.format;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_output.as_str() {
        "file" => Some(init_file_logging(env_filter, log_format, &config.paths.log_dir)),
        "both" => Some(init_combined_logging(env_filter, log_format, &config.paths.log_dir)),
        _ => {
            init_console_logging(env_filter, log_format);
            None
        }
    }
}

/// Correlation id stamped on a run's root span so interleaved log files can
/// be split per run.
pub fn run_id() -> String {
    Uuid::new_v4().to_string()
}

fn init_console_logging(filter: EnvFilter, format: &str) {
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(true),
                )
                .init();
        }
        _ => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}

fn init_file_logging(filter: EnvFilter, format: &str, log_dir: &std::path::Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_current_span(true),
                )
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
    }
    guard
}

fn init_combined_logging(filter: EnvFilter, format: &str, log_dir: &std::path::Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stdout))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stdout))
                .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
        }
    }
    guard
}

pub mod filter;
pub mod format;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

use self::filter::DebugOnlyFilter;
use self::filter::ErrorWarnFilter;
use self::format::DarkblockFormat;
use crate::config::LoggingConfig;
use crate::err_with_loc;

/// Keeps the non-blocking file writers flushing. Drop it only at shutdown.
#[must_use]
pub struct TracingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Install the global subscriber: terminal output filtered by `RUST_LOG`
/// (falling back to `logging.level`), plus daily rolling debug and
/// warn/error files under `logging.directory` when one is configured.
pub fn setup_tracing(
    engine_name: &str,
    logging_config: &LoggingConfig,
) -> crate::Result<TracingGuards> {
    let format = DarkblockFormat {
        engine_name: engine_name.to_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging_config.level))?;

    let terminal = tracing_subscriber::fmt::Layer::default()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .event_format(format.clone())
        .with_filter(env_filter);

    let mut guards = Vec::new();
    let mut file_layers = Vec::new();

    if let Some(directory) = logging_config.directory.as_deref() {
        let base_logs_dir = Path::new(directory);
        let debug_dir = base_logs_dir.join("debug");
        let error_dir = base_logs_dir.join("error");

        for dir in [&debug_dir, &error_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| err_with_loc!(format!("failed to create logs directory {}: {}", dir.display(), e)))?;
        }

        let debug_appender = RollingFileAppender::new(Rotation::DAILY, &debug_dir, format!("{}.log", engine_name));
        let error_appender = RollingFileAppender::new(Rotation::DAILY, &error_dir, format!("{}.log", engine_name));

        let (non_blocking_debug, debug_guard) = tracing_appender::non_blocking(debug_appender);
        let (non_blocking_error, error_guard) = tracing_appender::non_blocking(error_appender);
        guards.push(debug_guard);
        guards.push(error_guard);

        file_layers.push(
            tracing_subscriber::fmt::Layer::default()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .event_format(format.clone())
                .with_writer(non_blocking_debug)
                .with_filter(DebugOnlyFilter)
                .boxed(),
        );
        file_layers.push(
            tracing_subscriber::fmt::Layer::default()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .event_format(format.clone())
                .with_writer(non_blocking_error)
                .with_filter(ErrorWarnFilter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(file_layers)
        .with(terminal)
        .try_init()
        .map_err(|e| err_with_loc!(format!("failed to install tracing subscriber: {}", e)))?;

    match logging_config.directory.as_deref() {
        Some(directory) => tracing::info!("{}_logging_started::logs::{}", engine_name, directory),
        None => tracing::info!("{}_logging_started::terminal_only", engine_name),
    }

    Ok(TracingGuards { _guards: guards })
}

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Set up the global tracing subscriber from `logging` config: a stdout
/// layer, plus a rolling-file layer when `enable_file_logging` is on.
/// An explicit `logging.level` beats `RUST_LOG`; without either, "info".
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let file_writer = if cfg.enable_file_logging {
        rolling_writer(cfg)
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Json => {
            let stdout = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339());
            let file = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = registry.with(stdout).with(file).try_init();
        }
        LogFormat::Text => {
            let stdout = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(UtcTime::rfc_3339());
            let file = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = registry.with(stdout).with(file).try_init();
        }
    }
}

/// Build the non-blocking rolling-file writer, or fall back to stdout-only
/// logging when the log directory cannot be created.
fn rolling_writer(cfg: &LoggingConfig) -> Option<NonBlocking> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!("Cannot create log directory {:?} ({err}); file logging disabled", cfg.dir);
        return None;
    }

    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    };

    let appender = RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // the worker thread stops when the guard drops; logging runs for the
    // whole process, so the guard is intentionally never dropped
    std::mem::forget(guard);

    Some(writer)
}

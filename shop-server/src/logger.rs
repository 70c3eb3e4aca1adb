//! Logging Infrastructure
//!
//! - console output (pretty in development, JSON otherwise)
//! - optional daily rotating file under `LOG_DIR`
//! - `security` target for authentication failures (see [`crate::security_log`])

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Build the env filter: `RUST_LOG` wins over `level`
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shop_server={level},shared={level},tower_http=info")))
}

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug")
/// * `json_format` - JSON lines instead of human readable output
/// * `log_dir` - Optional directory for the daily rotating `shop.log.*` files
///
/// The returned guard must be kept alive for the file writer to flush.
pub fn init_logger(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> Result<Option<WorkerGuard>, BoxError> {
    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(Path::new(dir))?;
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), BoxError> {
    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, "shop.log");
    Ok(tracing_appender::non_blocking(appender))
}

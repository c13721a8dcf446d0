use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rolling log files
pub const LOG_FILE_NAME: &str = "desk-agent.log";

/// Initialize the logging system
///
/// Logs go to `dir` only (no console output) so the REPL stays readable.
/// Default level is INFO, overridable with `RUST_LOG`.
pub fn init_logging(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .context("Logging was already initialized")?;

    tracing::info!("Logging system initialized");
    tracing::info!("Log files location: {}", dir.join(LOG_FILE_NAME).display());

    Ok(())
}

//! Logging setup
//!
//! Console output goes to stderr so stdout stays free for command output.
//! An optional daily-rolling file receives the same events without ANSI
//! colors.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use super::{CoreError, CoreResult};

/// Name prefix of the rolling log file
pub const LOG_FILE_PREFIX: &str = "gamramstone.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Logging options
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Directory for the rolling log file; console only when `None`
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            ansi: cfg!(debug_assertions),
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(options: &LoggingOptions) -> CoreResult<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .map_err(|e| CoreError::ConfigError(format!("Invalid log level: {}", e)))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(options.ansi);

    let file_layer = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    // Another subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    let _ = INITIALIZED.set(());

    tracing::debug!(level = %options.level, "Logging initialized");
    Ok(())
}

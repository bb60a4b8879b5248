//! tracing subscriber setup.
//!
//! CLI commands log to stderr. The TUI owns the terminal, so it logs to a
//! file under the config directory through a non-blocking writer.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use sme_plug_core::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "SMEPLUG_LOG";
const LOG_FILE_NAME: &str = "smeplug.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_cli(verbose: bool) -> Result<()> {
    let default = if verbose { "sme_plug_core=debug,smeplug=debug" } else { "warn" };
    fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")
}

/// Log to `<config_dir>/sme-plug/logs/smeplug.log`. Returns the file path.
pub fn init_tui() -> Result<PathBuf> {
    let dir = Config::config_dir()?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")?;
    let _ = LOG_GUARD.set(guard);

    let path = dir.join(LOG_FILE_NAME);
    tracing::info!("logging to {}", path.display());
    Ok(path)
}

//! CLI command implementations

pub mod demo;
pub mod fund;
pub mod logs;
pub mod session;
pub mod status;
pub mod withdraw;

use std::path::PathBuf;

use anyhow::{Context, Result};
use fundgate_core::services::{EntryPoint, LogEvent, LoggingService};
use fundgate_core::FundgateContext;

/// Environment variable overriding the data directory
const FUNDGATE_DIR_ENV: &str = "FUNDGATE_DIR";

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize; logging never blocks a transfer.
pub fn get_logger() -> Option<LoggingService> {
    let dir = get_fundgate_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;
    LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from `FUNDGATE_DIR` or `~/.fundgate`
pub fn get_fundgate_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(FUNDGATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".fundgate"))
        .context("Could not find home directory; set FUNDGATE_DIR")
}

/// Build the context, creating the data directory if needed
pub fn get_context() -> Result<FundgateContext> {
    let dir = get_fundgate_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create fundgate directory: {:?}", dir))?;
    FundgateContext::new(&dir).context("Failed to initialize fundgate context")
}

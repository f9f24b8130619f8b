use crate::model::LogConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "MINIBOARD_LOG";

/// Sends tracing output to the configured file. The terminal belongs to the
/// UI, so without a file nothing is installed.
pub fn init(cfg: &LogConfig) -> Result<bool> {
    let Some(path) = cfg.file.as_deref() else {
        return Ok(false);
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {path}"))?;
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(cfg.filter.as_deref().unwrap_or("info")))
        .context("building log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(true)
}

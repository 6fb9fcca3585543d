//! Tracing initialization and log file access.

use std::fs::OpenOptions;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Log to stdout, and to the configured file when there is one.
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Bytes read from the end of the log file when showing its tail
pub const LOG_TAIL_BYTES: u64 = 64 * 1024;

/// Read at most the last `max_bytes` of the log file. When the read starts
/// mid-file, the partial first line is dropped.
pub async fn read_log_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start)).await?;

    let mut buf = Vec::new();
    file.take(max_bytes).read_to_end(&mut buf).await?;
    let text = String::from_utf8_lossy(&buf);

    match text.find('\n') {
        Some(newline) if start > 0 => Ok(text[newline + 1..].to_string()),
        _ => Ok(text.into_owned()),
    }
}

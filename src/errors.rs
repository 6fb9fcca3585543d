//! # Error Types Module
//!
//! Structured errors for the library side of the bot. Handlers and actions
//! work with `anyhow::Result` and wrap these where needed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the bounded media scan and the frame source
#[derive(Debug, Error)]
pub enum ScanError {
    /// The frame directory could not be listed
    #[error("cannot read frame directory {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A frame could not be decoded
    #[error("cannot decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// A face crop could not be encoded for sending
    #[error("cannot encode image: {0}")]
    Encode(#[from] image::ImageError),
    /// The blocking scan worker panicked or was cancelled
    #[error("scan worker failed: {0}")]
    Worker(String),
}

/// Errors raised when changing analysis settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unrecognized setting payload: {0}")]
    UnknownPayload(String),
    #[error("invalid value for {setting}: {value}")]
    InvalidValue { setting: &'static str, value: String },
    #[error("{setting} must be between {min} and {max}, got {value}")]
    OutOfRange {
        setting: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by session store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cannot encode session path: {0}")]
    Encoding(#[from] serde_json::Error),
}

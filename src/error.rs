use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the stem-karaoke-core crate.
#[derive(Debug, Error)]
pub enum KaraokeError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Acquisition
    #[error("Could not acquire `{identifier}`: {reason}")]
    Acquisition { identifier: String, reason: String },

    #[error("No results found for `{0}`")]
    NoResults(String),

    #[error("Unsupported audio format: {path}")]
    UnsupportedFormat { path: PathBuf },

    // Separation
    #[error("Separation failed for {path}: {reason}")]
    Separation { path: PathBuf, reason: String },

    #[error("Separation output not found in {dir}: missing {missing}")]
    OutputNotFound { dir: PathBuf, missing: String },

    #[error("A separation job is already running for {0}")]
    JobInFlight(PathBuf),

    // Recording
    #[error("Recording failed: {0}")]
    Recording(String),

    #[error("Invalid recording device `{0}`")]
    InvalidDevice(String),

    // Mixing
    #[error("Mix failed: {0}")]
    Mix(String),

    #[error("Could not determine duration of {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("External tool `{tool}` could not be started: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No source track selected, fetch or upload a song first")]
    NoSelection,
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for KaraokeError {
    fn from(e: std::io::Error) -> Self {
        KaraokeError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for KaraokeError {
    fn from(e: serde_json::Error) -> Self {
        KaraokeError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for KaraokeError {
    fn from(e: reqwest::Error) -> Self {
        KaraokeError::Anyhow(e.into())
    }
}

impl From<hound::Error> for KaraokeError {
    fn from(e: hound::Error) -> Self {
        KaraokeError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for KaraokeError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        KaraokeError::Anyhow(e.into())
    }
}

impl From<toml::de::Error> for KaraokeError {
    fn from(e: toml::de::Error) -> Self {
        KaraokeError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KaraokeError>;

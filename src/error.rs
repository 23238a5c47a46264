use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors for a whole import run. Per-line decode failures are
/// [`DecodeError`] and never abort the run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to fetch subscription: {0}")]
    SubscriptionFetch(String),

    #[error("no usable nodes in subscription ({failed} line(s) failed to decode)")]
    EmptyNodeSet { failed: usize },

    #[error("failed to write configuration: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("engine did not report active after reload: {0}")]
    Reload(String),

    #[error("another import is already running (lock file {} exists)", .0.display())]
    Locked(PathBuf),
}

/// Per-line decode failure. The offending line is skipped and counted;
/// processing continues with the remaining lines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid base64 payload")]
    InvalidBase64,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}

//! Hookwire error type.

/// Convenience result alias used across all Hookwire crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the engine and its collaborators.
///
/// `UnsupportedAction` is deliberately its own variant so callers can
/// tell "nobody handles this (target, action) pair" apart from a
/// sender that tried and failed: the poller logs and moves on, the
/// synchronous API path turns it into a 400.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration (workflow params, credentials).
    #[error("Config error: {0}")]
    Config(String),

    /// Source connector failure (unreachable, bad response shape).
    #[error("Source error: {0}")]
    Source(String),

    /// A sender failed to deliver a payload.
    #[error("Send error: {0}")]
    Send(String),

    /// No sender is registered for this (target, action) pair.
    #[error("Unsupported action: {target}/{action}")]
    UnsupportedAction { target: String, action: String },

    /// Cursor or registry persistence failure.
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the error means "no route", not "route failed".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedAction { .. })
    }
}

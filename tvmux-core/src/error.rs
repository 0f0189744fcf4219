//! Common error types for tvmux

use thiserror::Error;

/// Common result type for tvmux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the catalog core.
///
/// Refresh-path errors (`UpstreamUnavailable`, `MalformedPayload`) are
/// absorbed by the orchestrator, which logs them and keeps serving the last
/// good snapshot; they never reach catalog or guide callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream provider unreachable, timed out, or returned a non-2xx status
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream payload could not be decoded (JSON/HTML/shape mismatch)
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Requested channel or source does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required provider credentials are missing; fatal at startup only
    #[error("Configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for the llama manager client.

use reqwest::StatusCode;

/// Failure of a client operation.
///
/// After retries are exhausted the error of the last attempt is returned
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection failure, DNS failure or per-attempt timeout.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// A 2xx response whose body was not JSON.
    #[error("Invalid response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl Error {
    /// Whether the attempt ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout())
    }

    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

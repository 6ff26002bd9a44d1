use thiserror::Error;

/// Failure talking to the remote management API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The API could not be reached at all (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered, but with a failure status or an unreadable payload.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Protocol(format!("malformed response: {e}"))
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown server: {0}")]
    UnknownInstance(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

//! Failure taxonomy for the client.
//!
//! Each variant maps onto how the caller must react: `RoomNotFound` is
//! terminal for the current view, `Unauthorized` means the cached admin
//! credential must be evicted and re-prompted, and everything
//! transport-shaped is retried silently on the next tick or reconnect
//! attempt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The server authoritatively reported that the room does not exist.
    #[error("room not found")]
    RoomNotFound,

    /// A privileged action was rejected because the admin credential was
    /// missing or wrong.
    #[error("admin credential rejected")]
    Unauthorized,

    /// Any other authoritative rejection from the REST API.
    #[error("server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced an authoritative answer (DNS, connect,
    /// timeout after retries, malformed transport).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The push channel could not connect, join or invoke.
    #[error("push channel failure: {0}")]
    Channel(String),

    /// A bounded wait expired.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Durable store I/O failed.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// A payload did not match the expected shape.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl Error {
    /// True when the next scheduled tick or reconnect attempt may succeed
    /// without any operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Channel(_) | Error::Timeout(_)
        )
    }
}

#[cfg(feature = "api")]
impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(feature = "api")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(feature = "channel")]
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Channel(err.to_string())
    }
}

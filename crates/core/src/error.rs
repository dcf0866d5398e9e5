use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a [`crate::session::Session`].
///
/// Every variant is fatal to the call that produced it. Nothing is retried and
/// a partially decoded response is dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefDataError {
    /// The session could not be started.
    #[error("failed to connect to {host}:{port}: {detail}")]
    Connection {
        host: String,
        port: u16,
        detail: String,
    },

    /// The named service could not be found or opened.
    #[error("failed to open {service}: {detail}")]
    Service { service: String, detail: String },

    /// The server embedded a `responseError` element in a response message.
    #[error("response error: {message}")]
    Response { message: String },

    /// The gateway failed to send a request or deliver the next event.
    #[error("transport error: {0}")]
    Transport(String),

    /// No terminal event arrived before the request deadline.
    #[error("no terminal response within {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request while it was outstanding.
    #[error("request cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response element did not have the shape or type the decoder expects.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("session is not open")]
    NotOpen,
}

impl RefDataError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

pub type Result<T, E = RefDataError> = std::result::Result<T, E>;

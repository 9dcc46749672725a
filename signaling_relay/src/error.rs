//! Error types for the signaling relay

use thiserror::Error;

/// Errors that can occur while relaying signals
#[derive(Error, Debug)]
pub enum SignalingError {
    /// Failed to queue a frame for a connection
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// The connection did not declare a usable identity
    #[error("Missing or empty identity")]
    MissingIdentity,

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from client requests
///
/// None of these close the connection; the offending frame is dropped.
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported message type
    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),

    /// A field required by the message type is absent or empty
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The `from` field names someone other than the connection's identity
    #[error("Sender mismatch: claimed {claimed}, connected as {actual}")]
    SenderMismatch {
        /// Identity named in the message
        claimed: String,
        /// Identity bound to the connection at handshake
        actual: String,
    },
}

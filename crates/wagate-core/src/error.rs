use thiserror::Error;

/// Top-level error type for wagate.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No open WhatsApp session.
    #[error("WhatsApp not connected. Please scan the QR code at /qr")]
    NotConnected,

    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Failure reported by the WhatsApp client library (send, enumerate, connect).
    #[error("{0}")]
    Collaborator(String),

    /// Group snapshot could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

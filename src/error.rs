// Error taxonomy for the transport layer. Everything else in the crate
// recovers silently with defined fallbacks; only transport operations
// surface typed errors to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("session is not open")]
    NotOpen,

    #[error("session task has terminated")]
    SessionGone,

    #[error("malformed message: {0}")]
    Encoding(#[from] serde_json::Error),
}

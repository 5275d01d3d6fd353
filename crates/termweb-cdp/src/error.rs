use std::time::Duration;

/// Errors surfaced by the CDP transport, reader thread, and command dispatch.
///
/// Maps onto the Transport / Protocol / Command-timeout rows of the error
/// taxonomy; Resource/User/Security rows live closer to the components that
/// raise them (kitty, vfs).
#[derive(Debug, thiserror::Error)]
pub enum CdpError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to discover debugger websocket url: {0}")]
    Discovery(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cdp frame: {0}")]
    Protocol(String),

    #[error("command {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("command {method} cancelled: {reason}")]
    Cancelled { method: String, reason: String },

    #[error("chrome returned an error for {method}: {message}")]
    Remote { method: String, message: String },

    #[error("json encode/decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl CdpError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CdpError::TransportClosed | CdpError::Io(_))
    }
}

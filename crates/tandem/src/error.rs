//! Unified error type for the Tandem meta crate.

use tandem_protocol::ProtocolError;
use tandem_session::SessionError;
use tandem_transport::TransportError;
use tandem_world::WorldError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// Server-side socket error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or an unexpected message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or session bookkeeping.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The world refused the operation or has stopped.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Client-side WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server answered the handshake with an error.
    #[error("rejected by server ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// A global tracing subscriber was already installed.
    #[error("logging already initialized: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

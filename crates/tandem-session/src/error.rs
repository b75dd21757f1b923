//! Error types for the session layer.

use tandem_protocol::ClientId;

/// Errors raised by authentication and the session directory.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No live session for this client.
    #[error("no session for client {0}")]
    NotFound(ClientId),

    /// The client already has a live session.
    #[error("client {0} is already connected")]
    AlreadyConnected(ClientId),

    /// The identifier belongs to the hosting participant and can't be
    /// claimed or released over the network.
    #[error("client identifier {0} is reserved for the host")]
    ReservedIdentifier(ClientId),
}

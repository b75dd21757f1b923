//! Authentication hook.
//!
//! Tandem doesn't know what a valid token looks like. The server calls
//! your [`Authenticator`] during the handshake and binds the returned
//! [`ClientId`] to the connection; every later request is attributed to
//! that id.

use tandem_protocol::ClientId;

use crate::SessionError;

/// Validates a handshake token and returns the participant's identity.
///
/// # Example
///
/// ```rust
/// use tandem_protocol::ClientId;
/// use tandem_session::{Authenticator, SessionError};
///
/// /// Uses the token itself as the numeric client id. Development only.
/// struct NumericToken;
///
/// impl Authenticator for NumericToken {
///     async fn authenticate(&self, token: &str) -> Result<ClientId, SessionError> {
///         token
///             .parse()
///             .map(ClientId)
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the identity for `token`.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] when the token is rejected.
    ///
    /// Implementations may simply write `async fn authenticate`; the
    /// future has to be `Send` because every connection runs on its own
    /// task.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ClientId, SessionError>> + Send;
}

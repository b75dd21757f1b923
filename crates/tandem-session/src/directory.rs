//! The session directory: the authority's list of live participants.
//!
//! # Concurrency note
//!
//! Plain `HashMap`, no locking. The directory is owned by the world actor
//! and only ever touched from that one task.

use std::collections::HashMap;

use tandem_protocol::{ClientId, EntityId};

use crate::{ClientSession, RolePolicy, SessionError};

/// Tracks connected participants and the entity each one owns.
///
/// ```text
/// new() ──→ [host, order 0]
/// on_connect(7) ──→ [host, C-7 order 1] ──→ on_disconnect(7) ──→ [host]
/// ```
///
/// The host session is created by [`SessionDirectory::new`] and is never
/// removed: the hosting participant has no handshake and no disconnect of
/// its own.
pub struct SessionDirectory {
    sessions: HashMap<ClientId, ClientSession>,
    policy: Box<dyn RolePolicy>,
    next_order: u64,
}

impl SessionDirectory {
    /// Creates a directory with the host already connected at order 0.
    pub fn new(policy: impl RolePolicy) -> Self {
        let mut directory = Self {
            sessions: HashMap::new(),
            policy: Box::new(policy),
            next_order: 0,
        };
        directory.insert(ClientId::HOST);
        directory
    }

    fn insert(&mut self, client_id: ClientId) -> &ClientSession {
        let order = self.next_order;
        self.next_order += 1;
        let role = self.policy.assign_role(order);
        tracing::info!(client = %client_id, %role, order, "session opened");
        self.sessions
            .entry(client_id)
            .or_insert(ClientSession::new(client_id, role, order))
    }

    /// Registers a participant that completed its handshake.
    ///
    /// # Errors
    /// - [`SessionError::ReservedIdentifier`] for the host identifier
    /// - [`SessionError::AlreadyConnected`] if the client is already live
    pub fn on_connect(&mut self, client_id: ClientId) -> Result<&ClientSession, SessionError> {
        if client_id.is_host() {
            return Err(SessionError::ReservedIdentifier(client_id));
        }
        if self.sessions.contains_key(&client_id) {
            return Err(SessionError::AlreadyConnected(client_id));
        }
        Ok(self.insert(client_id))
    }

    /// Removes a participant's session and returns it.
    ///
    /// The caller is responsible for despawning `owned_entity` first; the
    /// returned record still carries it so nothing is lost if it didn't.
    ///
    /// # Errors
    /// - [`SessionError::ReservedIdentifier`] for the host identifier
    /// - [`SessionError::NotFound`] if the client isn't connected
    pub fn on_disconnect(&mut self, client_id: ClientId) -> Result<ClientSession, SessionError> {
        if client_id.is_host() {
            return Err(SessionError::ReservedIdentifier(client_id));
        }
        let session = self
            .sessions
            .remove(&client_id)
            .ok_or(SessionError::NotFound(client_id))?;
        tracing::info!(client = %client_id, "session closed");
        Ok(session)
    }

    /// All live sessions in connection order (host first).
    pub fn list_connected(&self) -> Vec<&ClientSession> {
        let mut sessions: Vec<&ClientSession> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.connection_order);
        sessions
    }

    pub fn get(&self, client_id: ClientId) -> Option<&ClientSession> {
        self.sessions.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.sessions.contains_key(&client_id)
    }

    /// Records that `client_id` now owns `entity`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the client isn't connected.
    pub fn assign_entity(
        &mut self,
        client_id: ClientId,
        entity: EntityId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&client_id)
            .ok_or(SessionError::NotFound(client_id))?;
        session.owned_entity = Some(entity);
        Ok(())
    }

    /// Clears and returns the entity owned by `client_id`.
    pub fn release_entity(&mut self, client_id: ClientId) -> Option<EntityId> {
        self.sessions
            .get_mut(&client_id)
            .and_then(|s| s.owned_entity.take())
    }

    /// Number of live sessions, host included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Always `false` in practice: the host session can't be removed.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tandem_protocol::Role;

    use super::*;
    use crate::HostFirst;

    fn cid(id: u64) -> ClientId {
        ClientId(id)
    }

    fn directory() -> SessionDirectory {
        SessionDirectory::new(HostFirst)
    }

    /// Makes everyone a guest, including order 0.
    struct AllGuests;

    impl RolePolicy for AllGuests {
        fn assign_role(&self, _connection_order: u64) -> Role {
            Role::Guest
        }
    }

    #[test]
    fn test_new_registers_host_without_handshake() {
        let dir = directory();

        let host = dir.get(ClientId::HOST).expect("host is connected");
        assert_eq!(host.role, Role::Host);
        assert_eq!(host.connection_order, 0);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_on_connect_guest_gets_guest_role() {
        let mut dir = directory();

        let session = dir.on_connect(cid(7)).expect("should connect");

        assert_eq!(session.role, Role::Guest);
        assert_eq!(session.connection_order, 1);
        assert_eq!(session.owned_entity, None);
    }

    #[test]
    fn test_on_connect_host_identifier_is_reserved() {
        let mut dir = directory();

        let result = dir.on_connect(ClientId::HOST);

        assert!(matches!(result, Err(SessionError::ReservedIdentifier(c)) if c.is_host()));
    }

    #[test]
    fn test_on_connect_twice_returns_already_connected() {
        let mut dir = directory();
        dir.on_connect(cid(7)).unwrap();

        let result = dir.on_connect(cid(7));

        assert!(matches!(result, Err(SessionError::AlreadyConnected(c)) if c == cid(7)));
    }

    #[test]
    fn test_on_disconnect_returns_session_with_owned_entity() {
        let mut dir = directory();
        dir.on_connect(cid(7)).unwrap();
        dir.assign_entity(cid(7), EntityId(3)).unwrap();

        let session = dir.on_disconnect(cid(7)).expect("should disconnect");

        assert_eq!(session.owned_entity, Some(EntityId(3)));
        assert!(!dir.contains(cid(7)));
    }

    #[test]
    fn test_on_disconnect_unknown_returns_not_found() {
        let mut dir = directory();

        let result = dir.on_disconnect(cid(99));

        assert!(matches!(result, Err(SessionError::NotFound(c)) if c == cid(99)));
    }

    #[test]
    fn test_on_disconnect_host_is_rejected() {
        let mut dir = directory();

        assert!(dir.on_disconnect(ClientId::HOST).is_err());
        assert!(dir.contains(ClientId::HOST));
    }

    #[test]
    fn test_list_connected_is_in_connection_order() {
        let mut dir = directory();
        dir.on_connect(cid(9)).unwrap();
        dir.on_connect(cid(3)).unwrap();
        dir.on_connect(cid(5)).unwrap();

        let ids: Vec<ClientId> = dir.list_connected().iter().map(|s| s.client_id).collect();

        assert_eq!(ids, vec![ClientId::HOST, cid(9), cid(3), cid(5)]);
    }

    #[test]
    fn test_reconnect_after_disconnect_starts_clean() {
        let mut dir = directory();
        dir.on_connect(cid(7)).unwrap();
        dir.assign_entity(cid(7), EntityId(1)).unwrap();
        dir.on_disconnect(cid(7)).unwrap();

        let session = dir.on_connect(cid(7)).expect("reconnect should succeed");

        assert_eq!(session.owned_entity, None);
        assert_eq!(session.role, Role::Guest);
        assert_eq!(session.connection_order, 2);
    }

    #[test]
    fn test_release_entity_clears_ownership() {
        let mut dir = directory();
        dir.assign_entity(ClientId::HOST, EntityId(1)).unwrap();

        assert_eq!(dir.release_entity(ClientId::HOST), Some(EntityId(1)));
        assert_eq!(dir.release_entity(ClientId::HOST), None);
    }

    #[test]
    fn test_assign_entity_unknown_client_fails() {
        let mut dir = directory();

        let result = dir.assign_entity(cid(4), EntityId(1));

        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_custom_policy_controls_roles() {
        let mut dir = SessionDirectory::new(AllGuests);
        dir.on_connect(cid(2)).unwrap();

        assert_eq!(dir.get(ClientId::HOST).unwrap().role, Role::Guest);
        assert_eq!(dir.get(cid(2)).unwrap().role, Role::Guest);
    }
}

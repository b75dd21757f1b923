//! Session records and role assignment.

use tandem_protocol::{ClientId, EntityId, Role};

/// Decides a participant's role from its position in the connection order.
///
/// Order 0 is always the hosting participant, which the directory
/// registers before anyone else can connect.
pub trait RolePolicy: Send + Sync + 'static {
    fn assign_role(&self, connection_order: u64) -> Role;
}

/// The default policy: the first participant hosts, everyone else is a guest.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFirst;

impl RolePolicy for HostFirst {
    fn assign_role(&self, connection_order: u64) -> Role {
        if connection_order == 0 {
            Role::Host
        } else {
            Role::Guest
        }
    }
}

/// The authority's record of one connected participant.
///
/// Lives from connect to disconnect. `role` is fixed at creation;
/// `owned_entity` is the single player entity this participant controls,
/// if one is currently spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub role: Role,
    pub connection_order: u64,
    pub owned_entity: Option<EntityId>,
}

impl ClientSession {
    pub(crate) fn new(client_id: ClientId, role: Role, connection_order: u64) -> Self {
        Self {
            client_id,
            role,
            connection_order,
            owned_entity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_first_assigns_host_only_to_order_zero() {
        assert_eq!(HostFirst.assign_role(0), Role::Host);
        assert_eq!(HostFirst.assign_role(1), Role::Guest);
        assert_eq!(HostFirst.assign_role(42), Role::Guest);
    }

    #[test]
    fn test_new_session_owns_nothing() {
        let session = ClientSession::new(ClientId(7), Role::Guest, 1);
        assert_eq!(session.owned_entity, None);
    }
}

//! Role-based spawning and despawning of player entities.

use tandem_protocol::{ClientId, EntityId, Role, ServerEvent};
use tandem_session::SessionDirectory;
use tracing::info;

use crate::{Simulation, SpawnError, SpawnPoint, WorldConfig};

/// Creates and removes player entities.
///
/// The host always spawns as the host template at the host point, every
/// guest as the guest template at the guest point. Entity ids come from a
/// counter that is never rewound, so a respawned player gets a new id.
#[derive(Debug)]
pub struct SpawnCoordinator {
    host: SpawnPoint,
    guest: SpawnPoint,
    next_entity: u64,
}

impl SpawnCoordinator {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            host: config.host_spawn.clone(),
            guest: config.guest_spawn.clone(),
            next_entity: 1,
        }
    }

    pub fn spawn_point(&self, role: Role) -> &SpawnPoint {
        match role {
            Role::Host => &self.host,
            Role::Guest => &self.guest,
        }
    }

    /// Spawns the player entity for `client` according to its role,
    /// records ownership in the session, and announces it.
    ///
    /// # Errors
    /// - [`SpawnError::UnknownClient`] if `client` has no session
    /// - [`SpawnError::AlreadySpawned`] if it already owns an entity
    /// - [`SpawnError::TemplateMissing`] if its role has no template
    pub fn spawn_for_role(
        &mut self,
        sessions: &mut SessionDirectory,
        client: ClientId,
        sim: &mut Simulation,
    ) -> Result<EntityId, SpawnError> {
        let session = sessions.get(client).ok_or(SpawnError::UnknownClient(client))?;
        if let Some(existing) = session.owned_entity {
            return Err(SpawnError::AlreadySpawned(client, existing));
        }
        let role = session.role;

        let point = self.spawn_point(role);
        let template = point
            .template
            .clone()
            .ok_or(SpawnError::TemplateMissing(role))?;
        let position = point.position;

        let id = EntityId(self.next_entity);
        self.next_entity += 1;

        sessions.assign_entity(client, id)?;
        let event = sim
            .insert(id, client, role, template.name, position, template.half_extents)
            .spawned_event();
        sim.publish(event);

        info!(%client, %role, entity = %id, x = position.x, y = position.y, "player spawned");
        Ok(id)
    }

    /// Removes an entity, clears its owner's claim on it, and announces
    /// the removal.
    ///
    /// # Errors
    /// [`SpawnError::UnknownEntity`] if the entity does not exist.
    pub fn despawn(
        &mut self,
        sessions: &mut SessionDirectory,
        entity: EntityId,
        sim: &mut Simulation,
    ) -> Result<(), SpawnError> {
        let removed = sim.remove(entity).ok_or(SpawnError::UnknownEntity(entity))?;
        let owner = removed.owner;

        if sessions.get(owner).and_then(|s| s.owned_entity) == Some(entity) {
            sessions.release_entity(owner);
        }
        sim.publish(ServerEvent::EntityDespawned { entity, owner });

        info!(client = %owner, %entity, "player despawned");
        Ok(())
    }
}

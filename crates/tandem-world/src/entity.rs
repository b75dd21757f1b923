//! Player entities and the simulation state that holds them.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use tandem_protocol::{ClientId, EntityId, Role, ServerEvent};
use tracing::debug;

use crate::physics::{Aabb, BodyId, PhysicsWorld};
use crate::{EventBus, EventSender, ReplicatedTransform, SubscriberKey, WorldConfig};

/// One spawned player.
#[derive(Debug)]
pub struct PlayerEntity {
    pub(crate) id: EntityId,
    pub(crate) owner: ClientId,
    pub(crate) role: Role,
    pub(crate) template: String,
    pub(crate) transform: ReplicatedTransform,
    pub(crate) body: BodyId,
}

impl PlayerEntity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn position(&self) -> Vec3 {
        self.transform.get()
    }

    pub fn revision(&self) -> u64 {
        self.transform.revision()
    }

    /// The announcement a newcomer needs to build a mirror of this entity.
    pub fn spawned_event(&self) -> ServerEvent {
        ServerEvent::EntitySpawned {
            entity: self.id,
            owner: self.owner,
            role: self.role,
            template: self.template.clone(),
            position: self.transform.get(),
            revision: self.transform.revision(),
        }
    }
}

/// Entities, their bodies, and who is listening.
#[derive(Debug)]
pub struct Simulation {
    pub(crate) entities: BTreeMap<EntityId, PlayerEntity>,
    pub(crate) physics: PhysicsWorld,
    pub(crate) events: EventBus,
}

impl Simulation {
    pub fn new(config: &WorldConfig) -> Self {
        let mut physics = PhysicsWorld::new();
        for solid in &config.solids {
            physics.add_solid(solid.name.clone(), Aabb::new(solid.min, solid.max));
        }
        Self {
            entities: BTreeMap::new(),
            physics,
            events: EventBus::new(),
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&PlayerEntity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &PlayerEntity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Collision box of an entity, if it and its body exist.
    pub fn bounds_of(&self, id: EntityId) -> Option<Aabb> {
        let entity = self.entities.get(&id)?;
        self.physics.body_bounds(entity.body)
    }

    pub(crate) fn insert(
        &mut self,
        id: EntityId,
        owner: ClientId,
        role: Role,
        template: String,
        position: Vec3,
        half_extents: Vec2,
    ) -> &PlayerEntity {
        let body = self.physics.add_body(position.truncate(), half_extents);
        let mut transform = ReplicatedTransform::authority(id, position);
        self.events.subscribe_transform(&mut transform);
        self.entities.entry(id).or_insert(PlayerEntity {
            id,
            owner,
            role,
            template,
            transform,
            body,
        })
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<PlayerEntity> {
        let entity = self.entities.remove(&id)?;
        self.physics.remove_body(entity.body);
        Some(entity)
    }

    /// Brings a new subscriber up to date and then wires it into every
    /// future event: first the current entities are replayed to it alone,
    /// then it is subscribed to their transforms and to the bus.
    pub fn attach_subscriber(&mut self, key: SubscriberKey, sender: EventSender) {
        let mut replayed = 0usize;
        for entity in self.entities.values_mut() {
            if sender.send(entity.spawned_event()).is_ok() {
                replayed += 1;
            }
            entity.transform.subscribe(key, Box::new(sender.clone()));
        }
        self.events.attach(key, sender);
        debug!(subscriber = ?key, replayed, "event subscriber attached");
    }

    pub fn detach_subscriber(&mut self, key: SubscriberKey) {
        for entity in self.entities.values_mut() {
            entity.transform.unsubscribe(key);
        }
        if self.events.detach(key) {
            debug!(subscriber = ?key, "event subscriber detached");
        }
    }

    /// Allocates a key and attaches an observer under it.
    pub fn attach_observer(&mut self, sender: EventSender) -> SubscriberKey {
        let key = self.events.next_observer_key();
        self.attach_subscriber(key, sender);
        key
    }

    pub fn publish(&mut self, event: ServerEvent) {
        self.events.publish(event);
    }
}

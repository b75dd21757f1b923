//! The authoritative world: sessions, entities, stage, and the request
//! inbox, driven one tick at a time.
//!
//! `World` is synchronous and single-owner. The actor in
//! [`crate::actor`] owns one and feeds it; tests drive it directly.

use std::collections::VecDeque;

use glam::Vec3;
use serde::Serialize;
use tandem_protocol::{ClientId, ClientRequest, EntityId, Role, ServerEvent};
use tandem_session::{RolePolicy, SessionDirectory, SessionError};
use tracing::{debug, error, info, trace, warn};

use crate::stage::{GateSnapshot, ReentryPointSnapshot};
use crate::{
    EventSender, MotionIntent, MotionPipeline, MotionRejected, PlayerEntity, ResetOrchestrator,
    ResetReport, Simulation, SpawnCoordinator, Stage, SubscriberKey, WorldConfig, WorldError,
};

/// A request waiting in the inbox, tagged with the connection it came in on.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub client: ClientId,
    pub request: ClientRequest,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub tick: u64,
    pub processed: usize,
    pub triggers_fired: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub client_id: ClientId,
    pub role: Role,
    pub owned_entity: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub entity: EntityId,
    pub owner: ClientId,
    pub role: Role,
    pub template: String,
    pub position: Vec3,
    pub revision: u64,
}

/// Point-in-time copy of the world, for tooling and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    /// In connection order.
    pub sessions: Vec<SessionSnapshot>,
    /// In entity id order.
    pub entities: Vec<EntitySnapshot>,
    pub camera: Option<Vec3>,
    pub gates: Vec<GateSnapshot>,
    pub reentry_points: Vec<ReentryPointSnapshot>,
}

impl WorldSnapshot {
    pub fn entity_owned_by(&self, client: ClientId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.owner == client)
    }
}

pub struct World {
    sessions: SessionDirectory,
    spawner: SpawnCoordinator,
    motion: MotionPipeline,
    resets: ResetOrchestrator,
    sim: Simulation,
    stage: Stage,
    inbox: VecDeque<Inbound>,
    ready: bool,
    tick: u64,
}

impl World {
    /// Builds the world with the host session registered but not spawned.
    /// Call [`World::become_ready`] once the host is listening.
    pub fn new(config: &WorldConfig, policy: impl RolePolicy) -> Self {
        Self {
            sessions: SessionDirectory::new(policy),
            spawner: SpawnCoordinator::new(config),
            motion: MotionPipeline::new(),
            resets: ResetOrchestrator::new(),
            sim: Simulation::new(config),
            stage: Stage::new(config),
            inbox: VecDeque::new(),
            ready: false,
            tick: 0,
        }
    }

    /// Starts hosting: spawns the host's own player. Only the first call
    /// does anything.
    pub fn become_ready(&mut self) -> Option<EntityId> {
        if self.ready {
            return None;
        }
        self.ready = true;
        match self
            .spawner
            .spawn_for_role(&mut self.sessions, ClientId::HOST, &mut self.sim)
        {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "host spawn failed");
                None
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Routes events for `client` to `sender`. Used for the in-process
    /// host, which never goes through [`World::connect`].
    pub fn attach_participant(&mut self, client: ClientId, sender: EventSender) {
        let key = SubscriberKey::Participant(client);
        self.sim.attach_subscriber(key, sender);
        self.replay_gates(key);
    }

    /// Adds a passive listener. It first receives the current entities,
    /// then every event.
    pub fn attach_observer(&mut self, sender: EventSender) -> SubscriberKey {
        let key = self.sim.attach_observer(sender);
        self.replay_gates(key);
        key
    }

    pub fn detach_observer(&mut self, key: SubscriberKey) {
        self.sim.detach_subscriber(key);
    }

    /// Registers a remote participant and spawns its player.
    ///
    /// A failed spawn is logged but does not fail the connection; the
    /// participant may retry with a spawn request.
    pub fn connect(&mut self, client: ClientId, sender: EventSender) -> Result<Role, WorldError> {
        let role = self.sessions.on_connect(client)?.role;
        let key = SubscriberKey::Participant(client);
        self.sim.attach_subscriber(key, sender);
        self.replay_gates(key);

        if let Err(e) = self
            .spawner
            .spawn_for_role(&mut self.sessions, client, &mut self.sim)
        {
            error!(%client, error = %e, "connect-time spawn failed");
        }
        Ok(role)
    }

    /// Tells a newcomer which gates are currently open.
    fn replay_gates(&self, key: SubscriberKey) {
        for gate in self.stage.gates().iter().filter(|g| g.is_open()) {
            self.sim.events.send_to(
                key,
                ServerEvent::GateChanged {
                    gate: gate.name().to_owned(),
                    open: true,
                },
            );
        }
    }

    /// Despawns the participant's entity, then removes its session.
    /// Requests it left in the inbox are dropped.
    pub fn disconnect(&mut self, client: ClientId) -> Result<(), WorldError> {
        if client.is_host() {
            return Err(SessionError::ReservedIdentifier(client).into());
        }
        let session = self
            .sessions
            .get(client)
            .ok_or(SessionError::NotFound(client))?;

        if let Some(entity) = session.owned_entity {
            if let Err(e) = self.spawner.despawn(&mut self.sessions, entity, &mut self.sim) {
                error!(%client, %entity, error = %e, "despawn on disconnect failed");
            }
        }
        self.sessions.on_disconnect(client)?;
        self.sim
            .detach_subscriber(SubscriberKey::Participant(client));

        let before = self.inbox.len();
        self.inbox.retain(|inbound| inbound.client != client);
        let dropped = before - self.inbox.len();
        if dropped > 0 {
            debug!(%client, dropped, "dropped queued requests of departed client");
        }
        Ok(())
    }

    /// Queues a request for the next tick.
    pub fn enqueue(&mut self, client: ClientId, request: ClientRequest) {
        self.inbox.push_back(Inbound { client, request });
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// One world step: every queued request in arrival order, then the
    /// stage triggers.
    pub fn tick(&mut self) -> TickSummary {
        self.tick += 1;
        let mut processed = 0;
        while let Some(inbound) = self.inbox.pop_front() {
            self.handle(inbound);
            processed += 1;
        }
        let triggers_fired = self.stage.step(&mut self.sim);

        if processed > 0 || triggers_fired > 0 {
            trace!(tick = self.tick, processed, triggers_fired, "world tick");
        }
        TickSummary {
            tick: self.tick,
            processed,
            triggers_fired,
        }
    }

    fn handle(&mut self, inbound: Inbound) {
        let Inbound { client, request } = inbound;
        if !self.sessions.contains(client) {
            warn!(%client, ?request, "request from unknown client, ignoring");
            return;
        }

        match request {
            ClientRequest::RequestSpawn => self.handle_spawn_request(client),
            ClientRequest::RequestReset => {
                self.reset_all(client);
            }
            ClientRequest::SubmitMotion { displacement, tick } => {
                let intent = MotionIntent {
                    client,
                    displacement,
                    tick,
                };
                match self.motion.apply(intent, &self.sessions, &mut self.sim) {
                    Ok(_) => {}
                    Err(e @ MotionRejected::NoEntity(_)) => {
                        debug!(%client, tick, error = %e, "motion intent dropped");
                    }
                    Err(e) => warn!(%client, tick, error = %e, "motion intent rejected"),
                }
            }
        }
    }

    fn handle_spawn_request(&mut self, client: ClientId) {
        if client.is_host() {
            info!("host spawn request ignored, the host spawns when hosting starts");
            return;
        }
        if let Some(entity) = self.sessions.get(client).and_then(|s| s.owned_entity) {
            debug!(%client, %entity, "spawn request ignored, client already owns an entity");
            return;
        }
        if let Err(e) = self
            .spawner
            .spawn_for_role(&mut self.sessions, client, &mut self.sim)
        {
            error!(%client, error = %e, "requested spawn failed");
        }
    }

    /// Respawns every participant, restores the camera, and rearms the
    /// re-entry points. Identical whether the host calls it directly or a
    /// guest's request got it here.
    pub fn reset_all(&mut self, initiator: ClientId) -> ResetReport {
        self.resets.reset_all(
            initiator,
            &mut self.sessions,
            &mut self.spawner,
            &mut self.sim,
            &mut self.stage,
        )
    }

    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn resets_completed(&self) -> u64 {
        self.resets.completed()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// The entity `client` currently controls.
    pub fn entity_of(&self, client: ClientId) -> Option<&PlayerEntity> {
        let id = self.sessions.get(client)?.owned_entity?;
        self.sim.entity(id)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            sessions: self
                .sessions
                .list_connected()
                .into_iter()
                .map(|s| SessionSnapshot {
                    client_id: s.client_id,
                    role: s.role,
                    owned_entity: s.owned_entity,
                })
                .collect(),
            entities: self
                .sim
                .entities()
                .map(|e| EntitySnapshot {
                    entity: e.id(),
                    owner: e.owner(),
                    role: e.role(),
                    template: e.template().to_owned(),
                    position: e.position(),
                    revision: e.revision(),
                })
                .collect(),
            camera: self.stage.camera().map(|c| c.position()),
            gates: self.stage.gate_snapshot(),
            reentry_points: self.stage.reentry_snapshot(),
        }
    }
}

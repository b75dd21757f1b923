//! The participant side: mirrors of authoritative entities and the driver
//! that turns local input into motion intents.
//!
//! Nothing here writes authoritative state. A participant only ever
//! *sends* [`ClientRequest`]s and *applies* [`ServerEvent`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use glam::Vec3;
use tandem_protocol::{ClientId, ClientRequest, EntityId, Role, ServerEvent, TransformChange};
use tracing::{debug, trace};

use crate::{ReplicatedTransform, ReplicationError};

/// Two input axes, each clamped to `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputAxes {
    horizontal: f32,
    vertical: f32,
}

impl InputAxes {
    /// Non-finite values read as 0.
    pub fn new(horizontal: f32, vertical: f32) -> Self {
        let clamp = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            horizontal: clamp(horizontal),
            vertical: clamp(vertical),
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.horizontal
    }

    pub fn vertical(&self) -> f32 {
        self.vertical
    }

    pub fn is_zero(&self) -> bool {
        self.horizontal == 0.0 && self.vertical == 0.0
    }
}

/// Where the motion driver is in its cycle.
///
/// ```text
/// Idle ──sample──→ SamplingInput ──intent sent──→ AwaitingServerAck
///   ↑                    │ no input                   │ all acked
///   └────────────────────┴────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    SamplingInput,
    AwaitingServerAck,
}

/// Samples input once per local tick and produces motion intents for the
/// entity this participant owns.
///
/// The driver never moves anything itself: the displayed position only
/// changes when the authority's change comes back through a [`Mirror`].
#[derive(Debug)]
pub struct MotionDriver {
    speed: f32,
    entity: Option<EntityId>,
    phase: MotionPhase,
    outstanding: u32,
    tick: u64,
}

impl MotionDriver {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            entity: None,
            phase: MotionPhase::Idle,
            outstanding: 0,
            tick: 0,
        }
    }

    /// Points the driver at a newly owned entity. Outstanding intents for
    /// a previous entity will never be acknowledged and are forgotten.
    pub fn bind(&mut self, entity: EntityId) {
        self.entity = Some(entity);
        self.outstanding = 0;
        self.phase = MotionPhase::Idle;
    }

    pub fn unbind(&mut self) {
        self.entity = None;
        self.outstanding = 0;
        self.phase = MotionPhase::Idle;
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Intents sent but not yet reflected by an authority change.
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    /// One local tick. Returns the intent to send, if any.
    ///
    /// Produces nothing without an owned entity or with zero input. The
    /// displacement is `axes * speed * dt`.
    pub fn sample(&mut self, input: InputAxes, dt: Duration) -> Option<ClientRequest> {
        self.tick += 1;
        self.entity?;

        self.phase = MotionPhase::SamplingInput;
        let displacement =
            Vec3::new(input.horizontal, input.vertical, 0.0) * self.speed * dt.as_secs_f32();

        if input.is_zero() || displacement == Vec3::ZERO {
            self.phase = self.settled_phase();
            return None;
        }

        self.outstanding += 1;
        self.phase = MotionPhase::AwaitingServerAck;
        trace!(tick = self.tick, x = displacement.x, y = displacement.y, "motion intent");
        Some(ClientRequest::SubmitMotion {
            displacement,
            tick: self.tick,
        })
    }

    /// Counts an authority change on the owned entity as the answer to
    /// the oldest outstanding intent.
    pub fn acknowledge(&mut self, change: &TransformChange) {
        if self.entity != Some(change.entity) || self.outstanding == 0 {
            return;
        }
        self.outstanding -= 1;
        self.phase = self.settled_phase();
    }

    fn settled_phase(&self) -> MotionPhase {
        if self.outstanding > 0 {
            MotionPhase::AwaitingServerAck
        } else {
            MotionPhase::Idle
        }
    }
}

/// A participant's copy of one entity.
#[derive(Debug)]
pub struct Mirror {
    owner: ClientId,
    role: Role,
    template: String,
    transform: ReplicatedTransform,
    displayed: Vec3,
}

impl Mirror {
    pub fn new(
        entity: EntityId,
        owner: ClientId,
        role: Role,
        template: String,
        position: Vec3,
        revision: u64,
    ) -> Self {
        Self {
            owner,
            role,
            template,
            transform: ReplicatedTransform::replica(entity, position, revision),
            displayed: position,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.transform.entity()
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

    /// What this participant renders.
    pub fn position(&self) -> Vec3 {
        self.displayed
    }

    pub fn replicated(&self) -> &ReplicatedTransform {
        &self.transform
    }

    /// Applies an authority change. The displayed position is re-read
    /// from the replicated value whenever they disagree afterwards.
    pub fn on_change(&mut self, change: &TransformChange) -> Result<bool, ReplicationError> {
        let applied = self.transform.apply_remote(change)?;
        let authoritative = self.transform.get();
        if self.displayed != authoritative {
            self.displayed = authoritative;
        }
        Ok(applied)
    }
}

/// Everything one participant knows about the world, built purely from
/// the events it received.
#[derive(Debug)]
pub struct ParticipantView {
    client: ClientId,
    mirrors: BTreeMap<EntityId, Mirror>,
    driver: MotionDriver,
    camera: Option<Vec3>,
    open_gates: BTreeSet<String>,
    resets_seen: u64,
}

impl ParticipantView {
    pub fn new(client: ClientId, speed: f32) -> Self {
        Self {
            client,
            mirrors: BTreeMap::new(),
            driver: MotionDriver::new(speed),
            camera: None,
            open_gates: BTreeSet::new(),
            resets_seen: 0,
        }
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::EntitySpawned {
                entity,
                owner,
                role,
                template,
                position,
                revision,
            } => {
                let mirror = Mirror::new(*entity, *owner, *role, template.clone(), *position, *revision);
                self.mirrors.insert(*entity, mirror);
                if *owner == self.client {
                    self.driver.bind(*entity);
                }
            }
            ServerEvent::EntityDespawned { entity, .. } => {
                self.mirrors.remove(entity);
                if self.driver.entity() == Some(*entity) {
                    self.driver.unbind();
                }
            }
            ServerEvent::TransformChanged(change) => {
                let Some(mirror) = self.mirrors.get_mut(&change.entity) else {
                    debug!(client = %self.client, entity = %change.entity, "change for unknown entity");
                    return;
                };
                match mirror.on_change(change) {
                    Ok(true) => self.driver.acknowledge(change),
                    Ok(false) => {}
                    Err(e) => debug!(client = %self.client, error = %e, "change not applied"),
                }
            }
            ServerEvent::CameraMoved { position } => self.camera = Some(*position),
            ServerEvent::GateChanged { gate, open: true } => {
                self.open_gates.insert(gate.clone());
            }
            ServerEvent::GateChanged { gate, open: false } => {
                self.open_gates.remove(gate);
            }
            ServerEvent::WorldReset { .. } => self.resets_seen += 1,
        }
    }

    /// Runs the motion driver for one local tick.
    pub fn sample(&mut self, input: InputAxes, dt: Duration) -> Option<ClientRequest> {
        self.driver.sample(input, dt)
    }

    pub fn driver(&self) -> &MotionDriver {
        &self.driver
    }

    pub fn mirror(&self, entity: EntityId) -> Option<&Mirror> {
        self.mirrors.get(&entity)
    }

    pub fn mirrors(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.values()
    }

    pub fn own_entity(&self) -> Option<EntityId> {
        self.driver.entity()
    }

    pub fn own_position(&self) -> Option<Vec3> {
        self.own_entity()
            .and_then(|e| self.mirrors.get(&e))
            .map(Mirror::position)
    }

    /// Last camera position announced since this view was created.
    pub fn camera(&self) -> Option<Vec3> {
        self.camera
    }

    pub fn is_gate_open(&self, gate: &str) -> bool {
        self.open_gates.contains(gate)
    }

    pub fn resets_seen(&self) -> u64 {
        self.resets_seen
    }
}

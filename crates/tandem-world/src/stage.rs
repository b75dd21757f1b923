//! Shared stage state: the camera anchor, the re-entry points that
//! advance it, and the gates players open by standing on them.

use glam::Vec3;
use serde::Serialize;
use tandem_protocol::ServerEvent;
use tracing::{info, warn};

use crate::physics::Aabb;
use crate::{GateConfig, GateMode, ReentryPointConfig, Simulation, WorldConfig};

/// A one-shot trigger guard.
///
/// ```text
/// Armed ──fire()──→ Spent ──rearm()──→ Armed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latch {
    #[default]
    Armed,
    Spent,
}

impl Latch {
    /// Spends the latch. Returns `true` only on the armed → spent edge.
    pub fn fire(&mut self) -> bool {
        match self {
            Self::Armed => {
                *self = Self::Spent;
                true
            }
            Self::Spent => false,
        }
    }

    pub fn rearm(&mut self) {
        *self = Self::Armed;
    }

    pub fn is_armed(&self) -> bool {
        *self == Self::Armed
    }
}

/// The camera everyone shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraAnchor {
    origin: Vec3,
    position: Vec3,
}

impl CameraAnchor {
    pub fn new(origin: Vec3) -> Self {
        Self {
            origin,
            position: origin,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn shift(&mut self, delta: Vec3) -> Vec3 {
        self.position += delta;
        self.position
    }

    pub fn restore(&mut self) -> Vec3 {
        self.position = self.origin;
        self.position
    }
}

/// A region that moves the camera up once enough players stand in it.
#[derive(Debug, Clone)]
pub struct ReentryPoint {
    name: String,
    region: Aabb,
    camera_shift: f32,
    required_players: usize,
    active: bool,
    latch: Latch,
}

impl ReentryPoint {
    pub fn from_config(config: &ReentryPointConfig) -> Self {
        Self {
            name: config.name.clone(),
            region: Aabb::new(config.min, config.max),
            camera_shift: config.camera_shift,
            required_players: config.required_players,
            active: true,
            latch: Latch::Armed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn latch(&self) -> Latch {
        self.latch
    }

    /// Fires at most once between resets, when at least
    /// `required_players` are inside. A fired point deactivates.
    pub fn evaluate(&mut self, occupants: usize) -> bool {
        if !self.active || occupants < self.required_players {
            return false;
        }
        if !self.latch.fire() {
            return false;
        }
        self.active = false;
        true
    }

    /// Makes the point usable again.
    pub fn on_world_reset(&mut self) {
        self.active = true;
        self.latch.rearm();
    }
}

/// A trigger region that opens a named solid.
#[derive(Debug, Clone)]
pub struct Gate {
    name: String,
    region: Aabb,
    solid: String,
    mode: GateMode,
    open: bool,
    latch: Latch,
}

impl Gate {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            name: config.name.clone(),
            region: Aabb::new(config.min, config.max),
            solid: config.solid.clone(),
            mode: config.mode,
            open: false,
            latch: Latch::Armed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn solid(&self) -> &str {
        &self.solid
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Updates the gate for the current occupancy. Returns the new state
    /// when it changed.
    pub fn evaluate(&mut self, occupants: usize) -> Option<bool> {
        let open = match self.mode {
            GateMode::Hold => occupants > 0,
            GateMode::Once => self.open || (occupants > 0 && self.latch.fire()),
        };
        if open == self.open {
            return None;
        }
        self.open = open;
        Some(open)
    }

    /// Closes the gate and rearms it. Returns `true` if it was open.
    pub fn on_world_reset(&mut self) -> bool {
        self.latch.rearm();
        std::mem::replace(&mut self.open, false)
    }
}

/// Read-only view of a gate for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateSnapshot {
    pub name: String,
    pub open: bool,
}

/// Read-only view of a re-entry point for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReentryPointSnapshot {
    pub name: String,
    pub active: bool,
    pub armed: bool,
}

#[derive(Debug)]
pub struct Stage {
    camera: Option<CameraAnchor>,
    gates: Vec<Gate>,
    reentry_points: Vec<ReentryPoint>,
}

impl Stage {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            camera: config.camera_origin.map(CameraAnchor::new),
            gates: config.gates.iter().map(Gate::from_config).collect(),
            reentry_points: config
                .reentry_points
                .iter()
                .map(ReentryPoint::from_config)
                .collect(),
        }
    }

    pub fn camera(&self) -> Option<&CameraAnchor> {
        self.camera.as_ref()
    }

    pub fn reentry_points(&self) -> &[ReentryPoint] {
        &self.reentry_points
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Runs gates and re-entry triggers against the current player
    /// positions. Returns how many gate changes and re-entry firings
    /// happened.
    pub fn step(&mut self, sim: &mut Simulation) -> usize {
        let bounds: Vec<Aabb> = sim
            .entities()
            .filter_map(|entity| sim.bounds_of(entity.id()))
            .collect();

        let mut fired = 0;
        for gate in &mut self.gates {
            let occupants = bounds.iter().filter(|b| b.overlaps(&gate.region)).count();
            let Some(open) = gate.evaluate(occupants) else {
                continue;
            };
            fired += 1;
            Self::apply_gate(gate, open, sim);
            info!(gate = %gate.name, occupants, open, "gate changed");
        }

        for point in &mut self.reentry_points {
            let occupants = bounds.iter().filter(|b| b.overlaps(&point.region)).count();
            if !point.evaluate(occupants) {
                continue;
            }
            fired += 1;
            match &mut self.camera {
                Some(camera) => {
                    let position = camera.shift(Vec3::new(0.0, point.camera_shift, 0.0));
                    info!(point = %point.name, occupants, y = position.y, "re-entry point fired, camera advanced");
                    sim.publish(ServerEvent::CameraMoved { position });
                }
                None => {
                    warn!(point = %point.name, "re-entry point fired but no camera anchor is configured");
                }
            }
        }
        fired
    }

    /// Closes every open gate and rearms one-shot gates. Returns how many
    /// were closed.
    pub fn close_gates(&mut self, sim: &mut Simulation) -> usize {
        let mut closed = 0;
        for gate in &mut self.gates {
            if gate.on_world_reset() {
                Self::apply_gate(gate, false, sim);
                closed += 1;
            }
        }
        closed
    }

    fn apply_gate(gate: &Gate, open: bool, sim: &mut Simulation) {
        if sim.physics.set_solid_enabled(&gate.solid, !open) == 0 {
            warn!(gate = %gate.name, solid = %gate.solid, "gate controls no solid");
        }
        sim.publish(ServerEvent::GateChanged {
            gate: gate.name.clone(),
            open,
        });
    }

    /// Moves the camera back to its origin. `None` without an anchor.
    pub fn restore_camera(&mut self) -> Option<Vec3> {
        self.camera.as_mut().map(CameraAnchor::restore)
    }

    /// Reactivates and rearms every re-entry point.
    pub fn rearm_reentry_points(&mut self) -> usize {
        for point in &mut self.reentry_points {
            point.on_world_reset();
        }
        self.reentry_points.len()
    }

    pub fn gate_snapshot(&self) -> Vec<GateSnapshot> {
        self.gates
            .iter()
            .map(|g| GateSnapshot {
                name: g.name.clone(),
                open: g.open,
            })
            .collect()
    }

    pub fn reentry_snapshot(&self) -> Vec<ReentryPointSnapshot> {
        self.reentry_points
            .iter()
            .map(|p| ReentryPointSnapshot {
                name: p.name.clone(),
                active: p.active,
                armed: p.latch.is_armed(),
            })
            .collect()
    }
}

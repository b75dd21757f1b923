//! World configuration.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tandem_protocol::Role;

/// The shape a spawned player takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTemplate {
    /// Reported to participants so they can pick a visual.
    pub name: String,
    /// Half width / half height of the player's collision box.
    pub half_extents: Vec2,
}

impl PlayerTemplate {
    pub fn new(name: impl Into<String>, half_extents: Vec2) -> Self {
        Self {
            name: name.into(),
            half_extents,
        }
    }
}

/// Where and as what a role spawns.
///
/// `template: None` is a configuration error that surfaces when someone
/// of that role is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub template: Option<PlayerTemplate>,
    pub position: Vec3,
}

/// A static blocker (wall, floor, closed gate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidConfig {
    pub name: String,
    pub min: Vec2,
    pub max: Vec2,
}

/// A "next screen" trigger: once enough players stand inside `min..max`
/// the camera shifts up by `camera_shift` and the point switches off until
/// the next world reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReentryPointConfig {
    pub name: String,
    pub min: Vec2,
    pub max: Vec2,
    #[serde(default = "default_camera_shift")]
    pub camera_shift: f32,
    #[serde(default = "default_required_players")]
    pub required_players: usize,
}

/// How a gate reacts to players standing in its trigger region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Open while at least one player is inside, closed again once the
    /// region is empty.
    #[default]
    Hold,
    /// Opens on first contact and stays open until the next world reset.
    Once,
}

/// A pressure region that opens the solid called `solid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub name: String,
    pub min: Vec2,
    pub max: Vec2,
    pub solid: String,
    #[serde(default)]
    pub mode: GateMode,
}

fn default_camera_shift() -> f32 {
    2.0
}

fn default_required_players() -> usize {
    2
}

/// Everything the authoritative world needs to know at startup.
///
/// Every field has a default, so a JSON file only has to list what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World loop rate in Hz. 0 = process requests as they arrive.
    pub tick_rate: u32,

    /// Units per second at full input deflection. Used by participants
    /// to scale input into displacements.
    pub move_speed: f32,

    pub host_spawn: SpawnPoint,
    pub guest_spawn: SpawnPoint,

    /// Where the camera anchor starts and returns to on reset.
    /// `None` means the stage has no camera anchor.
    pub camera_origin: Option<Vec3>,

    pub solids: Vec<SolidConfig>,
    pub gates: Vec<GateConfig>,
    pub reentry_points: Vec<ReentryPointConfig>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50,
            move_speed: 5.0,
            host_spawn: SpawnPoint {
                template: Some(PlayerTemplate::new("player_a", Vec2::splat(0.5))),
                position: Vec3::new(-7.5, -2.0, 0.0),
            },
            guest_spawn: SpawnPoint {
                template: Some(PlayerTemplate::new("player_b", Vec2::splat(0.5))),
                position: Vec3::new(-7.5, -4.0, 0.0),
            },
            camera_origin: Some(Vec3::new(0.0, 0.0, -10.0)),
            solids: Vec::new(),
            gates: Vec::new(),
            reentry_points: Vec::new(),
        }
    }
}

impl WorldConfig {
    pub fn spawn_point(&self, role: Role) -> &SpawnPoint {
        match role {
            Role::Host => &self.host_spawn,
            Role::Guest => &self.guest_spawn,
        }
    }
}

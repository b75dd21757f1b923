//! Everything that travels between a participant and the authoritative side.
//!
//! Participants send [`ClientRequest`]s and receive [`ServerEvent`]s. Both
//! ride inside an [`Envelope`] next to the framework-level
//! [`SystemMessage`]s (handshake, heartbeat, errors).

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one participant in a running session.
///
/// Serialized as a bare number (`#[serde(transparent)]`), so `ClientId(7)`
/// is `7` on the wire. Identifier 0 belongs to the hosting participant,
/// which lives in the same process as the authoritative world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// The hosting participant. Connected without a handshake.
    pub const HOST: ClientId = ClientId(0);

    /// Returns `true` for the reserved host identifier.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Identifies a spawned player entity.
///
/// Entity ids are never reused within a process, so a respawned player
/// always shows up under a fresh id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// Which kind of player a participant controls.
///
/// The role decides the spawn template and spawn point, and never changes
/// for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Host,
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

/// One committed change of an entity's authoritative position.
///
/// `revision` increases by one with every commit on the same entity, which
/// lets a mirror discard duplicates and detect gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformChange {
    pub entity: EntityId,
    pub revision: u64,
    pub previous: Vec3,
    pub current: Vec3,
}

// ---------------------------------------------------------------------------
// Requests and events
// ---------------------------------------------------------------------------

/// Participant → authority.
///
/// None of these carry the sender: the authority uses the identity bound
/// to the connection during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// "Give me a player entity." Ignored for the host and for guests
    /// that already own one.
    RequestSpawn,

    /// "Put every player back at the start."
    RequestReset,

    /// "Move my entity by this much."
    /// `tick` is the sender's local tick, kept for logging.
    SubmitMotion { displacement: Vec3, tick: u64 },
}

/// Authority → participants (and in-process observers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A player entity now exists at `position`.
    EntitySpawned {
        entity: EntityId,
        owner: ClientId,
        role: Role,
        template: String,
        position: Vec3,
        revision: u64,
    },

    /// A player entity was removed.
    EntityDespawned { entity: EntityId, owner: ClientId },

    /// The authority committed a new position.
    TransformChanged(TransformChange),

    /// The shared camera anchor moved.
    CameraMoved { position: Vec3 },

    /// A gate trigger opened or closed the solid it controls.
    GateChanged { gate: String, open: bool },

    /// All players were respawned and the stage was rearmed.
    WorldReset { initiator: ClientId },
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Connection plumbing, handled by the server itself.
///
/// Internally tagged: `{ "type": "Heartbeat", "client_time": 5 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, first message on every connection.
    Handshake { version: u32, token: Option<String> },

    /// Server → Client: accepted. Carries the identity and role the
    /// authority assigned.
    HandshakeAck {
        client_id: ClientId,
        role: Role,
        server_time: u64,
    },

    /// Either direction: "I'm leaving."
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client, echoes `client_time` for RTT measurement.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client. `code` uses HTTP conventions (400, 401, 403, 409).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries.
///
/// Adjacently tagged: `{ "type": "Request", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Request(ClientRequest),
    Event(ServerEvent),
}

/// Top-level wire frame. Every message is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number, starting at 0 for the handshake.
    pub seq: u64,

    /// Milliseconds since the sender started its clock.
    pub timestamp: u64,

    pub payload: Payload,
}

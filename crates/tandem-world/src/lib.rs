//! Authoritative player state for Tandem.
//!
//! This crate owns everything the hosting side decides: which players
//! exist, where they are, and what happens on a reset. It sits between the
//! session directory and the networking layer:
//!
//! ```text
//! tandem (server, connection handlers)
//!     ↕  WorldHandle commands / ServerEvent streams
//! tandem-world (this crate)
//!     ↕
//! tandem-session, tandem-tick, tandem-protocol
//! ```
//!
//! # Pieces
//!
//! - [`ReplicatedTransform`]: single-writer position with ordered change
//!   notification.
//! - [`SpawnCoordinator`]: role-based spawn and despawn.
//! - [`MotionPipeline`]: validates and applies displacement intents through
//!   [`physics`].
//! - [`ResetOrchestrator`]: respawns everyone, closes gates and rearms the
//!   [`Stage`].
//! - [`World`]: ties them together behind a request inbox drained once per
//!   tick; [`spawn_world`] runs it as an actor.
//! - [`ParticipantView`]: the participant's mirror of all of the above.

mod actor;
mod config;
mod entity;
mod error;
mod events;
mod motion;
mod participant;
pub mod physics;
mod replicated;
mod reset;
mod spawn;
mod stage;
mod world;

pub use actor::{WorldHandle, spawn_world};
pub use config::{
    GateConfig, GateMode, PlayerTemplate, ReentryPointConfig, SolidConfig, SpawnPoint, WorldConfig,
};
pub use entity::{PlayerEntity, Simulation};
pub use error::{MotionRejected, ReplicationError, SpawnError, WorldError};
pub use events::{EventBus, EventSender, SubscriberKey};
pub use motion::{MotionIntent, MotionPipeline};
pub use participant::{InputAxes, Mirror, MotionDriver, MotionPhase, ParticipantView};
pub use replicated::{ReplicatedTransform, Side, TransformObserver};
pub use reset::{ResetOrchestrator, ResetReport};
pub use spawn::SpawnCoordinator;
pub use stage::{
    CameraAnchor, Gate, GateSnapshot, Latch, ReentryPoint, ReentryPointSnapshot, Stage,
};
pub use world::{EntitySnapshot, Inbound, SessionSnapshot, TickSummary, World, WorldSnapshot};

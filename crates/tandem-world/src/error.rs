//! Error types for the world layer.

use tandem_protocol::{ClientId, EntityId, Role};
use tandem_session::SessionError;

/// Why a player entity could not be spawned or despawned.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The spawn point for this role has no template configured.
    #[error("no player template configured for role {0}")]
    TemplateMissing(Role),

    /// The client has no live session.
    #[error("client {0} is not connected")]
    UnknownClient(ClientId),

    /// One entity per session.
    #[error("client {0} already owns entity {1}")]
    AlreadySpawned(ClientId, EntityId),

    /// The entity does not exist (already despawned, or never spawned).
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Misuse of a [`ReplicatedTransform`](crate::ReplicatedTransform).
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// `set` was called on a mirror.
    #[error("entity {0}: only the authority may write the transform")]
    NotAuthoritative(EntityId),

    /// A remote change was fed into the authoritative copy.
    #[error("entity {0}: the authority does not accept remote changes")]
    NotReplica(EntityId),

    /// A change for one entity was applied to another entity's mirror.
    #[error("change for entity {got} applied to mirror of {expected}")]
    WrongEntity { expected: EntityId, got: EntityId },
}

/// Why a motion intent was dropped instead of applied.
#[derive(Debug, thiserror::Error)]
pub enum MotionRejected {
    #[error("client {0} is not connected")]
    UnknownClient(ClientId),

    /// The sender has no entity (never spawned, or despawned by a reset or
    /// disconnect while the intent was queued).
    #[error("client {0} owns no entity")]
    NoEntity(ClientId),

    #[error("displacement is not finite")]
    NonFinite,

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Errors surfaced by the world and its actor handle.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The world actor has stopped or its command channel is closed.
    #[error("world is unavailable")]
    Unavailable,
}

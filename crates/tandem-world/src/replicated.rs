//! A position value with a single writer and change notification.
//!
//! The authoritative copy lives in the world; every participant holds a
//! [`Side::Replica`] that is only ever advanced by feeding it the
//! [`TransformChange`]s the authority produced.

use glam::Vec3;
use tandem_protocol::{EntityId, ServerEvent, TransformChange};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{ReplicationError, SubscriberKey};

/// Which copy of the transform this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Authority,
    Replica,
}

/// Receives every committed change of an authoritative transform.
pub trait TransformObserver: Send {
    /// Returns `false` once the observer is gone; it is then dropped.
    fn notify(&self, change: &TransformChange) -> bool;
}

impl TransformObserver for mpsc::UnboundedSender<ServerEvent> {
    fn notify(&self, change: &TransformChange) -> bool {
        self.send(ServerEvent::TransformChanged(*change)).is_ok()
    }
}

/// The replicated position of one entity.
pub struct ReplicatedTransform {
    entity: EntityId,
    side: Side,
    value: Vec3,
    revision: u64,
    observers: Vec<(SubscriberKey, Box<dyn TransformObserver>)>,
}

impl ReplicatedTransform {
    /// The writable copy, starting at revision 0.
    pub fn authority(entity: EntityId, value: Vec3) -> Self {
        Self {
            entity,
            side: Side::Authority,
            value,
            revision: 0,
            observers: Vec::new(),
        }
    }

    /// A read-only mirror, seeded from a spawn announcement.
    pub fn replica(entity: EntityId, value: Vec3, revision: u64) -> Self {
        Self {
            entity,
            side: Side::Replica,
            value,
            revision,
            observers: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn get(&self) -> Vec3 {
        self.value
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Commits a new value and notifies every observer in subscription
    /// order before returning.
    ///
    /// Every commit bumps the revision and notifies, including one that
    /// leaves the value unchanged.
    ///
    /// # Errors
    /// [`ReplicationError::NotAuthoritative`] on a replica.
    pub fn set(&mut self, value: Vec3) -> Result<TransformChange, ReplicationError> {
        if self.side != Side::Authority {
            return Err(ReplicationError::NotAuthoritative(self.entity));
        }

        let change = TransformChange {
            entity: self.entity,
            revision: self.revision + 1,
            previous: self.value,
            current: value,
        };
        self.value = value;
        self.revision = change.revision;

        self.observers.retain(|(key, observer)| {
            let alive = observer.notify(&change);
            if !alive {
                debug!(entity = %change.entity, subscriber = ?key, "dropping closed transform observer");
            }
            alive
        });
        trace!(
            entity = %change.entity,
            revision = change.revision,
            x = value.x,
            y = value.y,
            "transform committed"
        );
        Ok(change)
    }

    /// Advances a replica from an authority change.
    ///
    /// Returns `Ok(false)` for a change at or below the current revision
    /// (duplicate or reordered). When `previous` differs from the local
    /// value the replica is simply overwritten with `current`.
    pub fn apply_remote(&mut self, change: &TransformChange) -> Result<bool, ReplicationError> {
        if self.side != Side::Replica {
            return Err(ReplicationError::NotReplica(self.entity));
        }
        if change.entity != self.entity {
            return Err(ReplicationError::WrongEntity {
                expected: self.entity,
                got: change.entity,
            });
        }
        if change.revision <= self.revision {
            trace!(
                entity = %self.entity,
                revision = change.revision,
                local = self.revision,
                "ignoring stale transform change"
            );
            return Ok(false);
        }
        if change.previous != self.value {
            debug!(
                entity = %self.entity,
                revision = change.revision,
                "replica diverged, reconciling from authority"
            );
        }
        self.value = change.current;
        self.revision = change.revision;
        Ok(true)
    }

    /// Registers an observer. A second subscription under the same key
    /// replaces the first.
    pub fn subscribe(&mut self, key: SubscriberKey, observer: Box<dyn TransformObserver>) {
        self.unsubscribe(key);
        self.observers.push((key, observer));
    }

    pub fn unsubscribe(&mut self, key: SubscriberKey) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(k, _)| *k != key);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for ReplicatedTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedTransform")
            .field("entity", &self.entity)
            .field("side", &self.side)
            .field("value", &self.value)
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

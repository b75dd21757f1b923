//! Server half of the input-to-motion pipeline: validating and applying
//! displacement intents.

use glam::Vec3;
use tandem_protocol::{ClientId, TransformChange};
use tandem_session::SessionDirectory;
use tracing::trace;

use crate::{MotionRejected, Simulation};

/// A displacement one participant asked to apply to its own entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionIntent {
    /// The connection's identity, never a value taken from the payload.
    pub client: ClientId,
    pub displacement: Vec3,
    /// The sender's local tick, for logs only.
    pub tick: u64,
}

/// Applies motion intents to the sender's own entity through physics.
///
/// There is no length limit: the sweep stops at the first solid, so a long
/// displacement cannot tunnel through geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionPipeline;

impl MotionPipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, displacement: Vec3) -> Result<(), MotionRejected> {
        if !displacement.is_finite() {
            return Err(MotionRejected::NonFinite);
        }
        Ok(())
    }

    /// Moves the sender's entity by the intent's displacement, resolving
    /// collisions, and commits the result to its replicated transform.
    /// Observers are notified before this returns.
    ///
    /// The z coordinate is not simulated and keeps its current value.
    pub fn apply(
        &self,
        intent: MotionIntent,
        sessions: &SessionDirectory,
        sim: &mut Simulation,
    ) -> Result<TransformChange, MotionRejected> {
        self.validate(intent.displacement)?;

        let session = sessions
            .get(intent.client)
            .ok_or(MotionRejected::UnknownClient(intent.client))?;
        let entity_id = session
            .owned_entity
            .ok_or(MotionRejected::NoEntity(intent.client))?;

        let Simulation {
            entities, physics, ..
        } = sim;
        let entity = entities
            .get_mut(&entity_id)
            .ok_or(MotionRejected::NoEntity(intent.client))?;
        let center = physics
            .move_and_collide(entity.body, intent.displacement.truncate())
            .ok_or(MotionRejected::NoEntity(intent.client))?;

        let z = entity.transform.get().z;
        let change = entity.transform.set(center.extend(z))?;
        trace!(
            client = %intent.client,
            entity = %entity_id,
            tick = intent.tick,
            revision = change.revision,
            "motion applied"
        );
        Ok(change)
    }
}

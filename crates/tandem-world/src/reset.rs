//! Putting every player back at the start.

use glam::Vec3;
use tandem_protocol::{ClientId, EntityId, ServerEvent};
use tandem_session::SessionDirectory;
use tracing::{error, info, warn};

use crate::{Simulation, SpawnCoordinator, Stage};

/// What a reset did, per participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResetReport {
    pub initiator: Option<ClientId>,
    /// Participants that got a fresh entity.
    pub respawned: Vec<(ClientId, EntityId)>,
    /// Participants that owned nothing and were left alone.
    pub skipped: Vec<ClientId>,
    /// Participants whose despawn or respawn failed, with the reason.
    pub failed: Vec<(ClientId, String)>,
    /// Where the camera ended up, if there is one.
    pub camera: Option<Vec3>,
    /// Gates that were open and got closed.
    pub gates_closed: usize,
}

/// Despawns and respawns every connected participant's entity.
///
/// A failure for one participant is logged and recorded; the rest are
/// still reset.
#[derive(Debug, Default)]
pub struct ResetOrchestrator {
    completed: u64,
}

impl ResetOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets run so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn reset_all(
        &mut self,
        initiator: ClientId,
        sessions: &mut SessionDirectory,
        spawner: &mut SpawnCoordinator,
        sim: &mut Simulation,
        stage: &mut Stage,
    ) -> ResetReport {
        let mut report = ResetReport {
            initiator: Some(initiator),
            ..ResetReport::default()
        };

        let targets: Vec<(ClientId, Option<EntityId>)> = sessions
            .list_connected()
            .iter()
            .map(|s| (s.client_id, s.owned_entity))
            .collect();

        for (client, owned) in targets {
            let Some(entity) = owned else {
                warn!(%client, "reset: participant owns no entity, skipping");
                report.skipped.push(client);
                continue;
            };
            if let Err(e) = spawner.despawn(sessions, entity, sim) {
                error!(%client, %entity, error = %e, "reset: despawn failed");
                report.failed.push((client, e.to_string()));
                continue;
            }
            match spawner.spawn_for_role(sessions, client, sim) {
                Ok(id) => report.respawned.push((client, id)),
                Err(e) => {
                    error!(%client, error = %e, "reset: respawn failed");
                    report.failed.push((client, e.to_string()));
                }
            }
        }

        report.camera = stage.restore_camera();
        match report.camera {
            Some(position) => sim.publish(ServerEvent::CameraMoved { position }),
            None => warn!("reset: no camera anchor configured"),
        }
        report.gates_closed = stage.close_gates(sim);
        stage.rearm_reentry_points();
        sim.publish(ServerEvent::WorldReset { initiator });

        self.completed += 1;
        info!(
            %initiator,
            respawned = report.respawned.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            gates_closed = report.gates_closed,
            "world reset"
        );
        report
    }
}

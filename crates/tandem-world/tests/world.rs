//! World scenarios driven synchronously, one tick at a time.

use std::time::Duration;

use glam::{Vec2, Vec3};
use tandem_protocol::{ClientId, ClientRequest, EntityId, Role, ServerEvent};
use tandem_session::HostFirst;
use tandem_world::{
    GateConfig, GateMode, InputAxes, MotionPhase, ParticipantView, ReentryPointConfig, SolidConfig,
    World, WorldConfig, WorldError,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const GUEST: ClientId = ClientId(7);

fn motion(x: f32, y: f32) -> ClientRequest {
    ClientRequest::SubmitMotion {
        displacement: Vec3::new(x, y, 0.0),
        tick: 0,
    }
}

fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Host ready and listening, guest 7 connected.
struct Session {
    world: World,
    host_rx: UnboundedReceiver<ServerEvent>,
    guest_rx: UnboundedReceiver<ServerEvent>,
}

fn session(config: WorldConfig) -> Session {
    let mut world = World::new(&config, HostFirst);
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    world.attach_participant(ClientId::HOST, host_tx);
    world.become_ready();

    let (guest_tx, guest_rx) = mpsc::unbounded_channel();
    let role = world.connect(GUEST, guest_tx).expect("guest should connect");
    assert_eq!(role, Role::Guest);

    Session {
        world,
        host_rx,
        guest_rx,
    }
}

fn position_of(world: &World, client: ClientId) -> Option<Vec3> {
    world.entity_of(client).map(|e| e.position())
}

#[test]
fn test_host_and_guest_spawn_with_role_templates() {
    let s = session(WorldConfig::default());

    let host = s.world.entity_of(ClientId::HOST).unwrap();
    let guest = s.world.entity_of(GUEST).unwrap();

    assert_eq!(host.template(), "player_a");
    assert_eq!(host.position(), Vec3::new(-7.5, -2.0, 0.0));
    assert_eq!(guest.template(), "player_b");
    assert_eq!(guest.position(), Vec3::new(-7.5, -4.0, 0.0));
    assert_eq!(s.world.simulation().entity_count(), 2);
}

#[test]
fn test_late_joiner_receives_existing_entities_first() {
    let mut s = session(WorldConfig::default());

    let events = drain(&mut s.guest_rx);

    let owners: Vec<ClientId> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::EntitySpawned { owner, .. } => Some(*owner),
            _ => None,
        })
        .collect();
    assert_eq!(owners, vec![ClientId::HOST, GUEST]);
}

#[test]
fn test_two_intents_apply_in_order_and_notify_twice() {
    let mut s = session(WorldConfig::default());
    let (obs_tx, mut obs_rx) = mpsc::unbounded_channel();
    s.world.attach_observer(obs_tx);
    drain(&mut obs_rx);

    s.world.enqueue(GUEST, motion(1.0, 0.0));
    s.world.enqueue(GUEST, motion(1.0, 0.0));
    let summary = s.world.tick();

    assert_eq!(summary.processed, 2);
    assert_eq!(position_of(&s.world, GUEST), Some(Vec3::new(-5.5, -4.0, 0.0)));

    let changes: Vec<_> = drain(&mut obs_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::TransformChanged(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].revision, 1);
    assert_eq!(changes[0].previous, Vec3::new(-7.5, -4.0, 0.0));
    assert_eq!(changes[0].current, Vec3::new(-6.5, -4.0, 0.0));
    assert_eq!(changes[1].revision, 2);
    assert_eq!(changes[1].previous, Vec3::new(-6.5, -4.0, 0.0));
    assert_eq!(changes[1].current, Vec3::new(-5.5, -4.0, 0.0));
}

#[test]
fn test_intents_wait_for_the_next_tick() {
    let mut s = session(WorldConfig::default());

    s.world.enqueue(GUEST, motion(1.0, 0.0));

    assert_eq!(s.world.pending(), 1);
    assert_eq!(position_of(&s.world, GUEST), Some(Vec3::new(-7.5, -4.0, 0.0)));
}

#[test]
fn test_participant_views_converge_on_authority() {
    let mut s = session(WorldConfig::default());
    let mut host_view = ParticipantView::new(ClientId::HOST, 5.0);
    let mut guest_view = ParticipantView::new(GUEST, 5.0);

    s.world.enqueue(GUEST, motion(1.0, 0.5));
    s.world.enqueue(ClientId::HOST, motion(0.0, -1.0));
    s.world.tick();
    for event in drain(&mut s.host_rx) {
        host_view.apply(&event);
    }
    for event in drain(&mut s.guest_rx) {
        guest_view.apply(&event);
    }

    for client in [ClientId::HOST, GUEST] {
        let entity = s.world.entity_of(client).unwrap();
        let authoritative = entity.position();
        assert_eq!(host_view.mirror(entity.id()).unwrap().position(), authoritative);
        assert_eq!(guest_view.mirror(entity.id()).unwrap().position(), authoritative);
    }
    assert_eq!(guest_view.own_position(), Some(Vec3::new(-6.5, -3.5, 0.0)));
}

#[test]
fn test_collision_blocks_motion_but_still_commits() {
    let config = WorldConfig {
        solids: vec![SolidConfig {
            name: "wall".into(),
            min: Vec2::new(-6.0, -10.0),
            max: Vec2::new(-5.0, 10.0),
        }],
        ..WorldConfig::default()
    };
    let mut s = session(config);
    drain(&mut s.guest_rx);

    s.world.enqueue(GUEST, motion(1.0, 0.0));
    s.world.enqueue(GUEST, motion(1.0, 0.0));
    s.world.tick();

    assert_eq!(position_of(&s.world, GUEST), Some(Vec3::new(-6.5, -4.0, 0.0)));
    let revisions: Vec<u64> = drain(&mut s.guest_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::TransformChanged(c) => Some(c.revision),
            _ => None,
        })
        .collect();
    assert_eq!(revisions, vec![1, 2]);
}

#[test]
fn test_long_intent_is_applied_in_full() {
    let mut s = session(WorldConfig::default());

    s.world.enqueue(GUEST, motion(2.5, 0.0));
    s.world.tick();

    let guest = s.world.entity_of(GUEST).unwrap();
    assert_eq!(guest.position(), Vec3::new(-5.0, -4.0, 0.0));
    assert_eq!(guest.revision(), 1);
}

#[test]
fn test_non_finite_intent_is_dropped() {
    let mut s = session(WorldConfig::default());

    s.world.enqueue(GUEST, motion(f32::NAN, 0.0));
    s.world.tick();

    let guest = s.world.entity_of(GUEST).unwrap();
    assert_eq!(guest.position(), Vec3::new(-7.5, -4.0, 0.0));
    assert_eq!(guest.revision(), 0);
}

#[test]
fn test_slow_frame_intent_returns_driver_to_idle() {
    let mut s = session(WorldConfig::default());
    let mut view = ParticipantView::new(GUEST, 5.0);
    for event in drain(&mut s.guest_rx) {
        view.apply(&event);
    }

    let request = view
        .sample(InputAxes::new(1.0, 1.0), Duration::from_millis(500))
        .expect("diagonal input produces an intent");
    assert_eq!(view.driver().phase(), MotionPhase::AwaitingServerAck);
    s.world.enqueue(GUEST, request);
    s.world.tick();
    for event in drain(&mut s.guest_rx) {
        view.apply(&event);
    }
    for _ in 0..5 {
        assert!(view.sample(InputAxes::default(), Duration::from_millis(20)).is_none());
    }

    assert_eq!(view.driver().phase(), MotionPhase::Idle);
    assert_eq!(view.driver().outstanding(), 0);
    assert_eq!(view.own_position(), Some(Vec3::new(-5.0, -1.5, 0.0)));
}

#[test]
fn test_reset_restores_spawn_points_with_fresh_entities() {
    let mut s = session(WorldConfig::default());
    let before_host = s.world.entity_of(ClientId::HOST).unwrap().id();
    let before_guest = s.world.entity_of(GUEST).unwrap().id();
    s.world.enqueue(GUEST, motion(1.0, 1.0));
    s.world.tick();

    let report = s.world.reset_all(ClientId::HOST);

    assert_eq!(report.respawned.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.camera, Some(Vec3::new(0.0, 0.0, -10.0)));
    let host = s.world.entity_of(ClientId::HOST).unwrap();
    let guest = s.world.entity_of(GUEST).unwrap();
    assert_ne!(host.id(), before_host);
    assert_ne!(guest.id(), before_guest);
    assert_eq!(host.position(), Vec3::new(-7.5, -2.0, 0.0));
    assert_eq!(guest.position(), Vec3::new(-7.5, -4.0, 0.0));
    assert_eq!(s.world.simulation().entity_count(), 2);
}

#[test]
fn test_reset_twice_is_idempotent() {
    let mut s = session(WorldConfig::default());

    s.world.reset_all(ClientId::HOST);
    let first = s.world.snapshot();
    s.world.reset_all(ClientId::HOST);
    let second = s.world.snapshot();

    let positions = |snap: &tandem_world::WorldSnapshot| -> Vec<(ClientId, Vec3)> {
        snap.entities.iter().map(|e| (e.owner, e.position)).collect()
    };
    assert_eq!(positions(&first), positions(&second));
    assert_eq!(first.camera, second.camera);
    assert_eq!(second.entities.len(), 2);
    assert_eq!(s.world.resets_completed(), 2);
}

#[test]
fn test_guest_reset_request_matches_local_reset() {
    let mut local = session(WorldConfig::default());
    local.world.enqueue(GUEST, motion(1.0, 0.0));
    local.world.tick();
    local.world.reset_all(ClientId::HOST);

    let mut remote = session(WorldConfig::default());
    remote.world.enqueue(GUEST, motion(1.0, 0.0));
    remote.world.tick();
    remote.world.enqueue(GUEST, ClientRequest::RequestReset);
    remote.world.tick();

    let local = local.world.snapshot();
    let remote = remote.world.snapshot();
    assert_eq!(local.entities, remote.entities);
    assert_eq!(local.sessions, remote.sessions);
    assert_eq!(local.camera, remote.camera);
}

#[test]
fn test_reset_broadcasts_despawn_spawn_and_reset_events() {
    let mut s = session(WorldConfig::default());
    drain(&mut s.host_rx);

    s.world.enqueue(GUEST, ClientRequest::RequestReset);
    s.world.tick();

    let events = drain(&mut s.host_rx);
    let despawns = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::EntityDespawned { .. }))
        .count();
    let spawns = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::EntitySpawned { .. }))
        .count();
    assert_eq!(despawns, 2);
    assert_eq!(spawns, 2);
    assert_eq!(
        events.last(),
        Some(&ServerEvent::WorldReset { initiator: GUEST })
    );
}

#[test]
fn test_reconnect_gets_a_fresh_entity() {
    let mut s = session(WorldConfig::default());
    let first = s.world.entity_of(GUEST).unwrap().id();
    s.world.enqueue(GUEST, motion(1.0, 0.0));
    s.world.tick();

    s.world.disconnect(GUEST).unwrap();
    assert!(s.world.entity_of(GUEST).is_none());
    assert_eq!(s.world.simulation().entity_count(), 1);

    let (tx, _rx) = mpsc::unbounded_channel();
    s.world.connect(GUEST, tx).unwrap();
    let second = s.world.entity_of(GUEST).unwrap();

    assert_ne!(second.id(), first);
    assert_eq!(second.position(), Vec3::new(-7.5, -4.0, 0.0));
}

#[test]
fn test_disconnect_drops_queued_requests() {
    let mut s = session(WorldConfig::default());
    s.world.enqueue(GUEST, motion(1.0, 0.0));
    s.world.enqueue(ClientId::HOST, motion(1.0, 0.0));

    s.world.disconnect(GUEST).unwrap();
    let summary = s.world.tick();

    assert_eq!(summary.processed, 1);
    assert_eq!(position_of(&s.world, ClientId::HOST), Some(Vec3::new(-6.5, -2.0, 0.0)));
}

#[test]
fn test_disconnect_host_or_unknown_fails() {
    let mut s = session(WorldConfig::default());

    assert!(matches!(s.world.disconnect(ClientId::HOST), Err(WorldError::Session(_))));
    assert!(matches!(s.world.disconnect(ClientId(99)), Err(WorldError::Session(_))));
    assert!(s.world.entity_of(ClientId::HOST).is_some());
}

#[test]
fn test_connecting_twice_is_rejected() {
    let mut s = session(WorldConfig::default());
    let (tx, _rx) = mpsc::unbounded_channel();

    let result = s.world.connect(GUEST, tx);

    assert!(matches!(result, Err(WorldError::Session(_))));
    assert_eq!(s.world.simulation().entity_count(), 2);
}

#[test]
fn test_spawn_requests_never_create_a_second_entity() {
    let mut s = session(WorldConfig::default());

    s.world.enqueue(GUEST, ClientRequest::RequestSpawn);
    s.world.enqueue(ClientId::HOST, ClientRequest::RequestSpawn);
    s.world.tick();

    assert_eq!(s.world.simulation().entity_count(), 2);
}

#[test]
fn test_missing_guest_template_spawns_nothing_for_guest() {
    let mut config = WorldConfig::default();
    config.guest_spawn.template = None;
    let mut s = session(config);

    s.world.enqueue(GUEST, ClientRequest::RequestSpawn);
    s.world.tick();

    assert!(s.world.entity_of(GUEST).is_none());
    assert!(s.world.entity_of(ClientId::HOST).is_some());
    assert!(s.world.sessions().contains(GUEST));
}

#[test]
fn test_reset_reports_participants_without_entity() {
    let mut config = WorldConfig::default();
    config.guest_spawn.template = None;
    let mut s = session(config);

    let report = s.world.reset_all(ClientId::HOST);

    assert_eq!(report.skipped, vec![GUEST]);
    assert_eq!(report.respawned.len(), 1);
}

#[test]
fn test_become_ready_spawns_host_once() {
    let mut world = World::new(&WorldConfig::default(), HostFirst);

    let first = world.become_ready();
    let second = world.become_ready();

    assert_eq!(first, Some(EntityId(1)));
    assert_eq!(second, None);
    assert_eq!(world.simulation().entity_count(), 1);
}

fn reentry_config() -> WorldConfig {
    WorldConfig {
        reentry_points: vec![ReentryPointConfig {
            name: "start-ledge".into(),
            min: Vec2::new(-8.0, -5.0),
            max: Vec2::new(-7.0, -1.0),
            camera_shift: 2.0,
            required_players: 2,
        }],
        ..WorldConfig::default()
    }
}

#[test]
fn test_reentry_point_needs_both_players() {
    let mut world = World::new(&reentry_config(), HostFirst);
    world.become_ready();

    let summary = world.tick();

    assert_eq!(summary.triggers_fired, 0);
    assert_eq!(world.snapshot().camera, Some(Vec3::new(0.0, 0.0, -10.0)));
}

#[test]
fn test_reentry_point_fires_once_and_rearms_on_reset() {
    let mut s = session(reentry_config());

    assert_eq!(s.world.tick().triggers_fired, 1);
    assert_eq!(s.world.snapshot().camera, Some(Vec3::new(0.0, 2.0, -10.0)));
    assert_eq!(s.world.tick().triggers_fired, 0);
    assert!(!s.world.snapshot().reentry_points[0].active);

    s.world.reset_all(GUEST);
    let snap = s.world.snapshot();
    assert_eq!(snap.camera, Some(Vec3::new(0.0, 0.0, -10.0)));
    assert!(snap.reentry_points[0].active);
    assert!(snap.reentry_points[0].armed);

    assert_eq!(s.world.tick().triggers_fired, 1);
    let moves: Vec<Vec3> = drain(&mut s.host_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::CameraMoved { position } => Some(position),
            _ => None,
        })
        .collect();
    assert_eq!(
        moves,
        vec![
            Vec3::new(0.0, 2.0, -10.0),
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(0.0, 2.0, -10.0),
        ]
    );
}

#[test]
fn test_reset_without_camera_still_respawns() {
    let config = WorldConfig {
        camera_origin: None,
        ..WorldConfig::default()
    };
    let mut s = session(config);

    let report = s.world.reset_all(ClientId::HOST);

    assert_eq!(report.camera, None);
    assert_eq!(report.respawned.len(), 2);
}

/// A wall east of the spawn points and a plate under the guest's spawn
/// that opens it.
fn gate_config(mode: GateMode) -> WorldConfig {
    WorldConfig {
        solids: vec![SolidConfig {
            name: "gate".into(),
            min: Vec2::new(-6.0, -10.0),
            max: Vec2::new(-5.0, 10.0),
        }],
        gates: vec![GateConfig {
            name: "plate".into(),
            min: Vec2::new(-8.0, -5.0),
            max: Vec2::new(-7.0, -3.6),
            solid: "gate".into(),
            mode,
        }],
        ..WorldConfig::default()
    }
}

fn gate_events(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<bool> {
    drain(rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::GateChanged { open, .. } => Some(open),
            _ => None,
        })
        .collect()
}

#[test]
fn test_hold_gate_opens_while_plate_is_occupied() {
    let mut s = session(gate_config(GateMode::Hold));

    assert_eq!(s.world.tick().triggers_fired, 1);
    assert!(s.world.snapshot().gates[0].open);

    s.world.enqueue(ClientId::HOST, motion(3.0, 0.0));
    s.world.tick();
    assert_eq!(position_of(&s.world, ClientId::HOST), Some(Vec3::new(-4.5, -2.0, 0.0)));

    s.world.enqueue(GUEST, motion(0.0, 2.0));
    s.world.tick();
    assert!(!s.world.snapshot().gates[0].open);

    s.world.enqueue(ClientId::HOST, motion(-3.0, 0.0));
    s.world.tick();
    assert_eq!(position_of(&s.world, ClientId::HOST), Some(Vec3::new(-4.5, -2.0, 0.0)));
    assert_eq!(gate_events(&mut s.host_rx), vec![true, false]);
}

#[test]
fn test_once_gate_stays_open_until_reset() {
    let mut s = session(gate_config(GateMode::Once));
    s.world.tick();
    s.world.enqueue(GUEST, motion(0.0, 2.0));
    s.world.tick();
    assert!(s.world.snapshot().gates[0].open);

    let report = s.world.reset_all(ClientId::HOST);

    assert_eq!(report.gates_closed, 1);
    assert!(!s.world.snapshot().gates[0].open);
    s.world.enqueue(ClientId::HOST, motion(3.0, 0.0));
    s.world.tick();
    assert_eq!(position_of(&s.world, ClientId::HOST), Some(Vec3::new(-6.5, -2.0, 0.0)));
    assert!(s.world.snapshot().gates[0].open);
    assert_eq!(gate_events(&mut s.guest_rx), vec![true, false, true]);
}

#[test]
fn test_late_observer_learns_open_gates() {
    let mut s = session(gate_config(GateMode::Hold));
    s.world.tick();

    let (tx, mut rx) = mpsc::unbounded_channel();
    s.world.attach_observer(tx);

    assert_eq!(gate_events(&mut rx), vec![true]);
}

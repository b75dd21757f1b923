//! World actor: the Tokio task that owns the authoritative [`World`].
//!
//! Connection handlers never touch the world directly. They hold a
//! [`WorldHandle`] and send it commands; the actor applies them in the
//! order they arrive and runs the world tick on its own schedule.

use tandem_protocol::{ClientId, ClientRequest, Role, ServerEvent};
use tandem_session::RolePolicy;
use tandem_tick::TickScheduler;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{EventSender, SubscriberKey, World, WorldConfig, WorldError, WorldSnapshot};

/// Commands the outside world can send to the actor.
pub(crate) enum WorldCommand {
    Connect {
        client: ClientId,
        events: EventSender,
        reply: oneshot::Sender<Result<Role, WorldError>>,
    },
    Disconnect {
        client: ClientId,
        reply: oneshot::Sender<Result<(), WorldError>>,
    },
    Request {
        client: ClientId,
        request: ClientRequest,
    },
    AttachObserver {
        events: EventSender,
        reply: oneshot::Sender<SubscriberKey>,
    },
    DetachObserver {
        key: SubscriberKey,
    },
    Snapshot {
        reply: oneshot::Sender<WorldSnapshot>,
    },
    Shutdown,
}

/// Handle to a running world actor. Cheap to clone.
#[derive(Clone)]
pub struct WorldHandle {
    sender: mpsc::Sender<WorldCommand>,
}

impl WorldHandle {
    /// Registers a participant that passed its handshake. Its player is
    /// spawned before this returns, and `events` already holds every
    /// entity that existed at that point.
    pub async fn connect(&self, client: ClientId, events: EventSender) -> Result<Role, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::Connect {
                client,
                events,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorldError::Unavailable)?;
        reply_rx.await.map_err(|_| WorldError::Unavailable)?
    }

    pub async fn disconnect(&self, client: ClientId) -> Result<(), WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::Disconnect {
                client,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorldError::Unavailable)?;
        reply_rx.await.map_err(|_| WorldError::Unavailable)?
    }

    /// Queues a request from `client` (fire-and-forget). It is applied on
    /// the next tick, after everything queued before it.
    pub async fn request(&self, client: ClientId, request: ClientRequest) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::Request { client, request })
            .await
            .map_err(|_| WorldError::Unavailable)
    }

    /// Subscribes a passive observer and returns its event stream.
    pub async fn attach_observer(
        &self,
    ) -> Result<(SubscriberKey, mpsc::UnboundedReceiver<ServerEvent>), WorldError> {
        let (events, rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::AttachObserver {
                events,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorldError::Unavailable)?;
        let key = reply_rx.await.map_err(|_| WorldError::Unavailable)?;
        Ok((key, rx))
    }

    pub async fn detach_observer(&self, key: SubscriberKey) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::DetachObserver { key })
            .await
            .map_err(|_| WorldError::Unavailable)
    }

    pub async fn snapshot(&self) -> Result<WorldSnapshot, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| WorldError::Unavailable)?;
        reply_rx.await.map_err(|_| WorldError::Unavailable)
    }

    pub async fn shutdown(&self) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::Shutdown)
            .await
            .map_err(|_| WorldError::Unavailable)
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct WorldActor {
    world: World,
    scheduler: TickScheduler,
    receiver: mpsc::Receiver<WorldCommand>,
}

impl WorldActor {
    async fn run(mut self) {
        info!(
            tick_rate_hz = ?self.scheduler.tick_duration().map(|d| 1.0 / d.as_secs_f64()),
            "world actor started"
        );
        self.world.become_ready();

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                tick = self.scheduler.wait_for_tick() => {
                    let summary = self.world.tick();
                    if tick.skipped > 0 {
                        debug!(world_tick = summary.tick, skipped = tick.skipped, "tick ran late");
                    }
                    self.scheduler.record_tick_end();
                }
            }
        }

        info!(ticks = self.world.current_tick(), "world actor stopped");
    }

    /// Returns `false` on shutdown.
    fn handle(&mut self, cmd: WorldCommand) -> bool {
        match cmd {
            WorldCommand::Connect {
                client,
                events,
                reply,
            } => {
                let _ = reply.send(self.world.connect(client, events));
            }
            WorldCommand::Disconnect { client, reply } => {
                let _ = reply.send(self.world.disconnect(client));
            }
            WorldCommand::Request { client, request } => {
                self.world.enqueue(client, request);
                if self.scheduler.is_event_driven() {
                    self.world.tick();
                }
            }
            WorldCommand::AttachObserver { events, reply } => {
                let _ = reply.send(self.world.attach_observer(events));
            }
            WorldCommand::DetachObserver { key } => {
                self.world.detach_observer(key);
            }
            WorldCommand::Snapshot { reply } => {
                let _ = reply.send(self.world.snapshot());
            }
            WorldCommand::Shutdown => {
                info!("world shutting down");
                return false;
            }
        }
        true
    }
}

/// Spawns the world actor and returns a handle to it.
///
/// `host_events` receives the host participant's events; the host's player
/// is spawned as soon as the actor starts. `channel_size` bounds the
/// command channel, so senders wait when the world falls behind.
pub fn spawn_world(
    config: WorldConfig,
    policy: impl RolePolicy,
    host_events: EventSender,
    channel_size: usize,
) -> WorldHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let mut world = World::new(&config, policy);
    world.attach_participant(ClientId::HOST, host_events);

    let actor = WorldActor {
        world,
        scheduler: TickScheduler::with_rate(config.tick_rate),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    WorldHandle { sender: tx }
}

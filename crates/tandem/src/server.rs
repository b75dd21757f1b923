//! `TandemServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → world. The
//! process that runs the server is also the host participant; its handle
//! is available through [`TandemServer::take_host`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tandem_protocol::{ClientId, Codec, JsonCodec};
use tandem_session::{Authenticator, HostFirst, RolePolicy};
use tandem_transport::{Transport, WebSocketTransport};
use tandem_world::{WorldConfig, WorldHandle, spawn_world};
use tokio::sync::mpsc;

use crate::TandemError;
use crate::handler::handle_connection;
use crate::host::HostParticipant;

/// Connection-level settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a new connection may take to send its handshake.
    pub handshake_timeout: Duration,
    /// A connected participant that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
    /// Capacity of the world actor's command channel.
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            command_buffer: 256,
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) world: WorldHandle,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) started: Instant,
}

impl<A: Authenticator, C: Codec> ServerState<A, C> {
    /// Milliseconds since the server started.
    pub(crate) fn server_time(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Tandem server.
///
/// ```rust,ignore
/// let mut server = TandemServer::builder()
///     .bind("0.0.0.0:7878")
///     .world_config(WorldConfig::default())
///     .build(my_auth)
///     .await?;
/// let host = server.take_host().expect("host handle");
/// server.run().await
/// ```
pub struct TandemServerBuilder {
    bind_addr: String,
    world_config: WorldConfig,
    server_config: ServerConfig,
}

impl TandemServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".to_string(),
            world_config: WorldConfig::default(),
            server_config: ServerConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn world_config(mut self, config: WorldConfig) -> Self {
        self.world_config = config;
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = config;
        self
    }

    /// Binds the listener and starts the world with the default
    /// [`HostFirst`] role policy.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<TandemServer<A, JsonCodec>, TandemError> {
        self.build_with_policy(auth, HostFirst).await
    }

    /// Like [`build`](Self::build) with a custom role policy.
    pub async fn build_with_policy<A: Authenticator>(
        self,
        auth: A,
        policy: impl RolePolicy,
    ) -> Result<TandemServer<A, JsonCodec>, TandemError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let move_speed = self.world_config.move_speed;
        let world = spawn_world(
            self.world_config,
            policy,
            host_tx,
            self.server_config.command_buffer,
        );
        let host = HostParticipant::new(world.clone(), host_rx, move_speed);

        let state = Arc::new(ServerState {
            world,
            auth,
            codec: JsonCodec,
            config: self.server_config,
            started: Instant::now(),
        });

        Ok(TandemServer {
            transport,
            state,
            host: Some(host),
        })
    }
}

impl Default for TandemServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Tandem server, bound and with its world running.
///
/// Call [`run()`](Self::run) to start accepting participants.
pub struct TandemServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
    host: Option<HostParticipant>,
}

impl<A, C> TandemServer<A, C>
where
    A: Authenticator,
    C: Codec + Clone,
{
    pub fn builder() -> TandemServerBuilder {
        TandemServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the authoritative world.
    pub fn world(&self) -> WorldHandle {
        self.state.world.clone()
    }

    /// The in-process host participant. `None` after the first call.
    pub fn take_host(&mut self) -> Option<HostParticipant> {
        self.host.take()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run(mut self) -> Result<(), TandemError> {
        tracing::info!(host = %ClientId::HOST, "tandem server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

//! Per-connection handler: handshake, auth, and routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get ClientId
//!   3. Register with the world → role assigned, player spawned
//!   4. Send HandshakeAck
//!   5. Loop: forward requests to the world, world events to the peer
//!   6. Leave the world, then close the socket

use std::sync::Arc;

use tandem_protocol::{
    ClientId, Codec, Envelope, PROTOCOL_VERSION, Payload, ProtocolError, ServerEvent,
    SystemMessage,
};
use tandem_session::{Authenticator, SessionError};
use tandem_transport::{Connection, WebSocketConnection};
use tandem_world::{WorldError, WorldHandle};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::TandemError;
use crate::server::ServerState;

/// Drop guard that removes the participant from the world when the
/// handler exits, however it exits.
///
/// On a normal exit [`WorldGuard::leave`] disconnects and waits for the
/// world to confirm. `Drop` covers the error paths; it is synchronous, so
/// there the disconnect runs as a fire-and-forget task.
struct WorldGuard {
    client_id: ClientId,
    world: WorldHandle,
    armed: bool,
}

impl WorldGuard {
    async fn leave(mut self) {
        self.armed = false;
        if let Err(e) = self.world.disconnect(self.client_id).await {
            tracing::debug!(client = %self.client_id, error = %e, "disconnect on close failed");
        }
    }
}

impl Drop for WorldGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let client_id = self.client_id;
        let world = self.world.clone();
        tokio::spawn(async move {
            if let Err(e) = world.disconnect(client_id).await {
                tracing::debug!(client = %client_id, error = %e, "disconnect after close failed");
            }
        });
    }
}

/// Outgoing sequence numbers for one connection.
struct Outbound {
    seq: u64,
}

impl Outbound {
    fn next_seq(&mut self) -> u64 {
        let current = self.seq;
        self.seq += 1;
        current
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), TandemError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut out = Outbound { seq: 0 };

    // --- Step 1: Handshake ---
    let client_id = perform_handshake(&conn, &state, &mut out).await?;

    // --- Step 2: Join the world ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let role = match state.world.connect(client_id, events_tx).await {
        Ok(role) => role,
        Err(e) => {
            let code = match &e {
                WorldError::Session(SessionError::AlreadyConnected(_)) => 409,
                WorldError::Session(SessionError::ReservedIdentifier(_)) => 403,
                _ => 503,
            };
            send_error(&conn, &state, &mut out, code, &e.to_string()).await?;
            return Err(e.into());
        }
    };
    let guard = WorldGuard {
        client_id,
        world: state.world.clone(),
        armed: true,
    };

    send_payload(
        &conn,
        &state,
        &mut out,
        Payload::System(SystemMessage::HandshakeAck {
            client_id,
            role,
            server_time: state.server_time(),
        }),
    )
    .await?;
    tracing::info!(%conn_id, client = %client_id, %role, "participant connected");

    // --- Step 3: Message loop ---
    let idle_timeout = state.config.idle_timeout;
    let idle = time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(client = %client_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(client = %client_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);

                let should_close = handle_frame(&conn, &state, &mut out, client_id, &data).await?;
                if should_close {
                    break;
                }
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!(client = %client_id, "world closed the event stream");
                    send_payload(
                        &conn,
                        &state,
                        &mut out,
                        Payload::System(SystemMessage::Disconnect {
                            reason: "server shutting down".into(),
                        }),
                    )
                    .await?;
                    break;
                };
                forward_event(&conn, &state, &mut out, event).await?;
            }
            () = &mut idle => {
                tracing::info!(client = %client_id, "connection timed out");
                break;
            }
        }
    }

    // Leave before closing, so the peer only sees the close once its id
    // is free again.
    guard.leave().await;
    if let Err(e) = conn.close().await {
        tracing::debug!(client = %client_id, error = %e, "close failed");
    }
    Ok(())
}

/// Receives and validates the handshake and authenticates the token.
/// The acknowledgement is sent later, once the world has accepted the
/// participant.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound,
) -> Result<ClientId, TandemError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(TandemError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_error(conn, state, out, 400, "malformed handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            send_error(conn, state, out, 400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            state,
            out,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let token = token.as_deref().unwrap_or("");
    let client_id = match state.auth.authenticate(token).await {
        Ok(id) => id,
        Err(e) => {
            send_error(conn, state, out, 401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    if client_id.is_host() {
        send_error(conn, state, out, 403, "identifier reserved for the host").await?;
        return Err(SessionError::ReservedIdentifier(client_id).into());
    }

    tracing::debug!(conn_id = %conn.id(), client = %client_id, "handshake accepted");
    Ok(client_id)
}

/// Handles one frame from a connected participant. Returns `true` if the
/// connection should close.
async fn handle_frame<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound,
    client_id: ClientId,
    data: &[u8],
) -> Result<bool, TandemError>
where
    A: Authenticator,
    C: Codec,
{
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(client = %client_id, error = %e, "failed to decode envelope");
            send_error(conn, state, out, 400, &format!("invalid envelope: {e}")).await?;
            return Ok(false);
        }
    };

    match envelope.payload {
        Payload::Request(request) => {
            tracing::trace!(client = %client_id, seq = envelope.seq, ?request, "request");
            state.world.request(client_id, request).await?;
        }

        Payload::System(SystemMessage::Heartbeat { client_time }) => {
            send_payload(
                conn,
                state,
                out,
                Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: state.server_time(),
                }),
            )
            .await?;
        }

        Payload::System(SystemMessage::Disconnect { reason }) => {
            tracing::info!(client = %client_id, %reason, "participant disconnected");
            return Ok(true);
        }

        Payload::System(SystemMessage::Handshake { .. }) => {
            send_error(conn, state, out, 409, "already connected").await?;
        }

        Payload::System(_) => {
            tracing::debug!(client = %client_id, "ignoring unexpected system message");
        }

        Payload::Event(_) => {
            send_error(conn, state, out, 400, "participants cannot send events").await?;
        }
    }

    Ok(false)
}

async fn forward_event<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound,
    event: ServerEvent,
) -> Result<(), TandemError>
where
    A: Authenticator,
    C: Codec,
{
    send_payload(conn, state, out, Payload::Event(event)).await
}

async fn send_payload<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound,
    payload: Payload,
) -> Result<(), TandemError>
where
    A: Authenticator,
    C: Codec,
{
    let envelope = Envelope {
        seq: out.next_seq(),
        timestamp: state.server_time(),
        payload,
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(TandemError::Transport)
}

/// Sends a SystemMessage::Error envelope to the peer.
async fn send_error<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound,
    code: u16,
    message: &str,
) -> Result<(), TandemError>
where
    A: Authenticator,
    C: Codec,
{
    send_payload(
        conn,
        state,
        out,
        Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }),
    )
    .await
}

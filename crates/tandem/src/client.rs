//! A remote participant: connects over WebSocket, completes the
//! handshake, and keeps a [`ParticipantView`] in sync with the events it
//! receives.

use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tandem_protocol::{
    ClientId, ClientRequest, Codec, Envelope, JsonCodec, PROTOCOL_VERSION, Payload, ProtocolError,
    Role, ServerEvent, SystemMessage,
};
use tandem_world::{InputAxes, ParticipantView};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::TandemError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long [`RemoteParticipant::close`] waits for the server's close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RemoteParticipant {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    codec: JsonCodec,
    client_id: ClientId,
    role: Role,
    view: ParticipantView,
    seq: u64,
    started: Instant,
    last_rtt: Option<Duration>,
}

impl RemoteParticipant {
    /// Connects to `url` (e.g. `ws://127.0.0.1:7878`) and performs the
    /// handshake.
    ///
    /// # Errors
    /// [`TandemError::Rejected`] if the server answers with an error,
    /// for example a bad token (401) or a duplicate connection (409).
    pub async fn connect(url: &str, token: Option<&str>, move_speed: f32) -> Result<Self, TandemError> {
        let (ws, _) = connect_async(url).await?;
        let (sink, stream) = ws.split();
        let mut this = Self {
            sink,
            stream,
            codec: JsonCodec,
            client_id: ClientId(u64::MAX),
            role: Role::Guest,
            view: ParticipantView::new(ClientId(u64::MAX), move_speed),
            seq: 0,
            started: Instant::now(),
            last_rtt: None,
        };

        this.send(Payload::System(SystemMessage::Handshake {
            version: PROTOCOL_VERSION,
            token: token.map(str::to_owned),
        }))
        .await?;

        let ack = this
            .recv_envelope()
            .await?
            .ok_or_else(|| ProtocolError::InvalidMessage("closed during handshake".into()))?;
        match ack.payload {
            Payload::System(SystemMessage::HandshakeAck {
                client_id, role, ..
            }) => {
                this.client_id = client_id;
                this.role = role;
                this.view = ParticipantView::new(client_id, move_speed);
                tracing::info!(client = %client_id, %role, "connected to host");
                Ok(this)
            }
            Payload::System(SystemMessage::Error { code, message }) => {
                Err(TandemError::Rejected { code, message })
            }
            other => Err(ProtocolError::InvalidMessage(format!(
                "expected HandshakeAck, got {other:?}"
            ))
            .into()),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn view(&self) -> &ParticipantView {
        &self.view
    }

    /// Round trip of the most recent heartbeat.
    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    pub async fn request(&mut self, request: ClientRequest) -> Result<(), TandemError> {
        self.send(Payload::Request(request)).await
    }

    /// Samples local input for one tick and sends the resulting intent.
    /// Returns whether anything was sent.
    pub async fn sample_input(&mut self, input: InputAxes, dt: Duration) -> Result<bool, TandemError> {
        match self.view.sample(input, dt) {
            Some(request) => {
                self.request(request).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn heartbeat(&mut self) -> Result<(), TandemError> {
        let client_time = self.elapsed_ms();
        self.send(Payload::System(SystemMessage::Heartbeat { client_time }))
            .await
    }

    /// Waits for the next world event and applies it to the view.
    /// System messages in between are handled on the way. `Ok(None)` when
    /// the server closes the connection.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, TandemError> {
        loop {
            let Some(envelope) = self.recv_envelope().await? else {
                return Ok(None);
            };
            match envelope.payload {
                Payload::Event(event) => {
                    self.view.apply(&event);
                    return Ok(Some(event));
                }
                Payload::System(SystemMessage::HeartbeatAck { client_time, .. }) => {
                    let rtt = self.elapsed_ms().saturating_sub(client_time);
                    self.last_rtt = Some(Duration::from_millis(rtt));
                    tracing::trace!(rtt_ms = rtt, "heartbeat acknowledged");
                }
                Payload::System(SystemMessage::Error { code, message }) => {
                    tracing::warn!(code, %message, "server reported an error");
                }
                Payload::System(SystemMessage::Disconnect { reason }) => {
                    tracing::info!(%reason, "server closed the session");
                    return Ok(None);
                }
                other => {
                    tracing::debug!(payload = ?other, "ignoring unexpected payload");
                }
            }
        }
    }

    /// Like [`next_event`](Self::next_event), giving up after `wait`.
    pub async fn next_event_within(&mut self, wait: Duration) -> Result<Option<ServerEvent>, TandemError> {
        match tokio::time::timeout(wait, self.next_event()).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    /// Says goodbye and waits for the server to close the socket. Once
    /// this returns, the server has released this client's id.
    pub async fn close(mut self, reason: &str) -> Result<(), TandemError> {
        self.send(Payload::System(SystemMessage::Disconnect {
            reason: reason.to_owned(),
        }))
        .await?;
        let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
            while let Some(msg) = self.stream.next().await {
                if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!(client = %self.client_id, "server did not close in time");
        }
        // Already closed once the server's close frame was answered.
        if let Err(e) = self.sink.close().await {
            tracing::trace!(client = %self.client_id, error = %e, "socket already closed");
        }
        Ok(())
    }

    async fn send(&mut self, payload: Payload) -> Result<(), TandemError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.elapsed_ms(),
            payload,
        };
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        self.sink.send(Message::Binary(bytes.into())).await?;
        Ok(())
    }

    async fn recv_envelope(&mut self) -> Result<Option<Envelope>, TandemError> {
        while let Some(msg) = self.stream.next().await {
            let data = match msg? {
                Message::Binary(data) => data,
                Message::Text(text) => text.as_bytes().to_vec().into(),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };
            return Ok(Some(self.codec.decode(&data)?));
        }
        Ok(None)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

//! # Tandem
//!
//! Authoritative server for two-player co-op platformers.
//!
//! One process hosts: it runs the world and plays as the host participant.
//! A second player connects over WebSocket as a guest. Every player's
//! position is decided by the host's world and replicated to everyone;
//! participants only send intents (spawn, reset, move).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::prelude::*;
//!
//! struct NumericToken;
//!
//! impl Authenticator for NumericToken {
//!     async fn authenticate(&self, token: &str) -> Result<ClientId, SessionError> {
//!         token
//!             .parse()
//!             .map(ClientId)
//!             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
//!     }
//! }
//!
//! # async fn run() -> Result<(), TandemError> {
//! let mut server = TandemServer::<NumericToken, tandem_protocol::JsonCodec>::builder()
//!     .bind("0.0.0.0:7878")
//!     .build(NumericToken)
//!     .await?;
//! let _host = server.take_host();
//! server.run().await
//! # }
//! ```

mod client;
mod error;
mod handler;
mod host;
mod logging;
mod server;

pub use client::RemoteParticipant;
pub use error::TandemError;
pub use host::HostParticipant;
pub use logging::init_logging;
pub use server::{ServerConfig, TandemServer, TandemServerBuilder};

pub mod prelude {
    pub use crate::{
        HostParticipant, RemoteParticipant, ServerConfig, TandemError, TandemServer,
        TandemServerBuilder, init_logging,
    };
    pub use tandem_protocol::{
        ClientId, ClientRequest, EntityId, Envelope, PROTOCOL_VERSION, Payload, Role,
        ServerEvent, SystemMessage, TransformChange, Vec3,
    };
    pub use tandem_session::{Authenticator, HostFirst, RolePolicy, SessionError};
    pub use tandem_world::{
        GateConfig, GateMode, InputAxes, ParticipantView, ReentryPointConfig, SolidConfig,
        WorldConfig, WorldHandle, WorldSnapshot,
    };
}

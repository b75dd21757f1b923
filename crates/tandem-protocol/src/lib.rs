//! Wire protocol for Tandem.
//!
//! - **Types** ([`Envelope`], [`ClientRequest`], [`ServerEvent`],
//!   [`SystemMessage`]) and the identifiers they carry ([`ClientId`],
//!   [`EntityId`], [`Role`]).
//! - **Codec** ([`Codec`], [`JsonCodec`]) for turning envelopes into bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / World
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use glam::Vec3;
pub use types::{
    ClientId, ClientRequest, EntityId, Envelope, Payload, Role, ServerEvent,
    SystemMessage, TransformChange,
};

/// Version a participant must announce in its handshake.
pub const PROTOCOL_VERSION: u32 = 1;

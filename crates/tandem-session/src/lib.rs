//! Who is connected, in which role, and which player entity they own.
//!
//! 1. **Authentication** — mapping a handshake token to a [`ClientId`]
//!    ([`Authenticator`]).
//! 2. **Role assignment** — [`RolePolicy`] decides Host vs Guest from the
//!    order in which participants connected.
//! 3. **Directory** — [`SessionDirectory`] tracks live [`ClientSession`]s.
//!
//! ```text
//! World (above)      ← asks the directory who to spawn and who owns what
//!     ↕
//! Session (this crate)
//!     ↕
//! Protocol (below)   ← ClientId, EntityId, Role
//! ```
//!
//! [`ClientId`]: tandem_protocol::ClientId

mod auth;
mod directory;
mod error;
mod session;

pub use auth::Authenticator;
pub use directory::SessionDirectory;
pub use error::SessionError;
pub use session::{ClientSession, HostFirst, RolePolicy};

//! Session-Relay – Verbindungen, Zustandsprojektion, Aufzeichnung und Wiedergabe
//!
//! ```text
//!                     +-------------------+
//!   TCP-Clients ----> |    RelayServer    |  accept + spawn_local
//!                     +---------+---------+
//!                               |
//!                     +---------v---------+
//!                     | ClientConnection  |  Frame-Schleife je Socket
//!                     +---------+---------+
//!                               |
//!                     +---------v---------+
//!                     |  RelayDispatcher  |
//!                     +--+------+------+--+
//!                        |      |      |
//!               lifecycle | router | recording / playback
//!                        |      |      |
//!                     +--v------v------v--+
//!                     |    RelayState     |  Registry + Broadcaster
//!                     +-------------------+  + CaptureStorage + AuditLog
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod entities;
pub mod error;
pub mod lifecycle;
pub mod playback;
pub mod recording;
pub mod router;
pub mod session;
pub mod state;
pub mod storage;
pub mod tcp;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use broadcast::RoomBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::RelayDispatcher;
pub use error::{RelayError, RelayResult};
pub use session::SessionRegistry;
pub use state::{RelayConfig, RelayState};
pub use storage::CaptureStorage;
pub use tcp::RelayServer;

//! seance-core: Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Seance-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;
pub mod zeit;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, SeanceError};
pub use types::{ClientId, EntityId, SessionId, SocketId};
pub use zeit::jetzt_ms;

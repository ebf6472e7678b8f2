//! seance-db: Audit-Datenbank
//!
//! Dieses Crate stellt die Audit-Senke des Relays bereit: Verbindungs- und
//! Capture-Ereignisse landen in SQLite. Fuer den Betrieb ohne Datenbank
//! gibt es eine No-Op-Implementierung; das Relay haengt nur am Trait.

pub mod audit;
pub mod error;
pub mod models;
pub mod sqlite;

pub use audit::{AuditLog, DatabaseConfig, NullAuditLog, VerbindungsEvent};
pub use error::{DbError, DbResult};
pub use sqlite::SqliteDb;

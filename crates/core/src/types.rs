//! Gemeinsame Identifikationstypen fuer Seance
//!
//! Session-, Client- und Entity-IDs kommen als Zahlen ueber die Leitung und
//! behalten ihren numerischen Kern; das Newtype-Pattern schliesst
//! Verwechslungen zwischen den ID-Arten zur Compilezeit aus. Socket-IDs
//! werden serverseitig pro Verbindung erzeugt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Session-ID (vom Client vergeben)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Eindeutige Client-ID (vom Client vergeben, sessionuebergreifend stabil)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

impl ClientId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

/// Eindeutige Entity-ID innerhalb einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl EntityId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Eindeutige Socket-ID (serverseitig pro Verbindung erzeugt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(pub Uuid);

impl SocketId {
    /// Erstellt eine neue zufaellige SocketId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "socket:{}", self.0)
    }
}

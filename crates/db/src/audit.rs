//! Audit-Senke fuer Verbindungs- und Capture-Ereignisse
//!
//! Das Relay meldet Lebenszyklus-Ereignisse an eine austauschbare Senke.
//! Die Senke ist strikt nachgelagert: ihr Fehlen oder Scheitern darf keine
//! Relay-Operation blockieren, der Aufrufer protokolliert Fehler lediglich.

use seance_core::types::{ClientId, SessionId};

use crate::error::DbResult;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://seance.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://seance.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Art eines Verbindungsereignisses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsEvent {
    Verbunden,
    Getrennt,
    Wiederverbunden,
}

impl VerbindungsEvent {
    /// Wire-/Spaltenwert des Ereignisses
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Verbunden => "connect",
            Self::Getrennt => "disconnect",
            Self::Wiederverbunden => "reconnect",
        }
    }
}

impl std::str::FromStr for VerbindungsEvent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connect" => Ok(Self::Verbunden),
            "disconnect" => Ok(Self::Getrennt),
            "reconnect" => Ok(Self::Wiederverbunden),
            other => Err(format!("Unbekanntes Verbindungsereignis: {other}")),
        }
    }
}

/// Audit-Senke fuer Relay-Ereignisse
#[allow(async_fn_in_trait)]
pub trait AuditLog: Send + Sync {
    /// Protokolliert ein Verbindungsereignis einer Session
    async fn verbindung_protokollieren(
        &self,
        zeitpunkt_ms: i64,
        session_id: SessionId,
        client_id: ClientId,
        event: VerbindungsEvent,
    ) -> DbResult<()>;

    /// Protokolliert den Beginn einer Aufzeichnung
    async fn capture_start_protokollieren(
        &self,
        capture_id: &str,
        session_id: SessionId,
        start_ms: i64,
    ) -> DbResult<()>;

    /// Protokolliert das Ende einer Aufzeichnung
    async fn capture_ende_protokollieren(&self, capture_id: &str, ende_ms: i64) -> DbResult<()>;
}

/// No-Op-Senke fuer den Betrieb ohne Datenbank
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLog;

impl AuditLog for NullAuditLog {
    async fn verbindung_protokollieren(
        &self,
        _zeitpunkt_ms: i64,
        _session_id: SessionId,
        _client_id: ClientId,
        _event: VerbindungsEvent,
    ) -> DbResult<()> {
        Ok(())
    }

    async fn capture_start_protokollieren(
        &self,
        _capture_id: &str,
        _session_id: SessionId,
        _start_ms: i64,
    ) -> DbResult<()> {
        Ok(())
    }

    async fn capture_ende_protokollieren(&self, _capture_id: &str, _ende_ms: i64) -> DbResult<()> {
        Ok(())
    }
}

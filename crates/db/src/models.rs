//! Datenbankmodelle fuer Seance
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Domain-Typen getrennt und dienen als reine Datenuebertragungsobjekte.

use serde::{Deserialize, Serialize};

use seance_core::types::{ClientId, SessionId};

use crate::audit::VerbindungsEvent;

// ---------------------------------------------------------------------------
// Verbindungen
// ---------------------------------------------------------------------------

/// Verbindungsereignis-Datensatz aus der Tabelle `connections`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerbindungsRecord {
    pub id: i64,
    pub ts_ms: i64,
    pub session_id: SessionId,
    pub client_id: ClientId,
    pub event: String,
}

impl VerbindungsRecord {
    /// Gibt das Ereignis typisiert zurueck (None bei unbekanntem Spaltenwert)
    pub fn event_typ(&self) -> Option<VerbindungsEvent> {
        self.event.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Captures
// ---------------------------------------------------------------------------

/// Capture-Datensatz aus der Tabelle `captures`
///
/// `end_ms` bleibt NULL solange die Aufzeichnung laeuft oder der Prozess
/// vor dem Stopp beendet wurde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub capture_id: String,
    pub session_id: SessionId,
    pub start_ms: i64,
    pub end_ms: Option<i64>,
}

impl CaptureRecord {
    /// Prueft ob die Aufzeichnung abgeschlossen wurde
    pub fn ist_abgeschlossen(&self) -> bool {
        self.end_ms.is_some()
    }
}

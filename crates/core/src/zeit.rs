//! Zeitstempel-Helfer
//!
//! Alle Zeitangaben im System (Session-Start, Aufzeichnungsbeginn,
//! Audit-Ereignisse, Sequenznummern) sind Unix-Millisekunden als i64.

use chrono::Utc;

/// Aktuelle Wanduhrzeit in Unix-Millisekunden
pub fn jetzt_ms() -> i64 {
    Utc::now().timestamp_millis()
}

//! Fehlertypen fuer Seance
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Seance
pub type Result<T> = std::result::Result<T, SeanceError>;

/// Alle moeglichen Fehler im Seance-System
#[derive(Debug, Error)]
pub enum SeanceError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Ressourcen ---
    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(String),

    // --- Aufzeichnung & Wiedergabe ---
    #[error("Wiedergabe fehlgeschlagen: {0}")]
    Wiedergabe(String),

    // --- E/A ---
    #[error("E/A-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisierungsfehler: {0}")]
    Json(#[from] serde_json::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SeanceError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler dem Client gemeldet wird
    ///
    /// Nur Validierungs- und Lookup-Fehler auf den join/state-Pfaden sind
    /// clientsichtbar; alles andere wird serverseitig protokolliert.
    pub fn ist_clientsichtbar(&self) -> bool {
        matches!(
            self,
            Self::UngueltigeNachricht(_) | Self::SessionNichtGefunden(_) | Self::Verbindung(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = SeanceError::UngueltigeNachricht("sessionId fehlt".into());
        assert_eq!(e.to_string(), "Ungueltige Nachricht: sessionId fehlt");
    }

    #[test]
    fn clientsichtbar_erkennung() {
        assert!(SeanceError::SessionNichtGefunden("session:9".into()).ist_clientsichtbar());
        assert!(!SeanceError::intern("test").ist_clientsichtbar());
    }

    #[test]
    fn io_fehler_konvertierung() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "weg");
        let e: SeanceError = io.into();
        assert!(e.to_string().starts_with("E/A-Fehler"));
    }
}

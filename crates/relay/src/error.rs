//! Fehlertypen fuer das Relay

use thiserror::Error;

/// Fehlertyp fuer Relay-Operationen
///
/// Die meisten Laufzeitfehler werden lokal protokolliert und absorbiert;
/// dieser Typ deckt die intern weitergereichten Faelle ab (Datei-I/O der
/// Capture-Ablage, Raum-Verwaltung).
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Capture-Dateien)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Serialisierungsfehler (Capture-Artefakt)
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Raum-Beitritt fehlgeschlagen (Socket nicht registriert)
    #[error("Raum-Beitritt fehlgeschlagen: {0}")]
    RaumBeitritt(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer Relay-Operationen
pub type RelayResult<T> = Result<T, RelayError>;

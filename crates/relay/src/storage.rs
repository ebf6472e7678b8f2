//! Capture-Ablage auf der Festplatte
//!
//! Jede Aufzeichnung bekommt ein eigenes Verzeichnis
//! `<wurzel>/<sessionId>/<aufzeichnungsbeginn>/` mit drei Dateien:
//! `data` (serialisierter Nachrichtenpuffer), `pos` und `int` (die
//! Legacy-Binaerstroeme). Die Stroeme wachsen per Append, waehrend die
//! Aufzeichnung laeuft.

use seance_core::types::SessionId;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::error::RelayResult;

/// Dateiname des serialisierten Nachrichtenpuffers
pub const STROM_DATEN: &str = "data";
/// Dateiname des Positions-Stroms
pub const STROM_POSITIONEN: &str = "pos";
/// Dateiname des Interaktions-Stroms
pub const STROM_INTERAKTIONEN: &str = "int";

/// Disk-Ablage fuer Capture-Artefakte
#[derive(Debug, Clone)]
pub struct CaptureStorage {
    wurzel: PathBuf,
}

impl CaptureStorage {
    /// Erstellt eine Ablage unter dem angegebenen Wurzelverzeichnis
    pub fn neu(wurzel: impl Into<PathBuf>) -> Self {
        Self {
            wurzel: wurzel.into(),
        }
    }

    /// Verzeichnis einer Aufzeichnung
    pub fn capture_verzeichnis(&self, session_id: SessionId, beginn_ms: i64) -> PathBuf {
        self.wurzel
            .join(session_id.inner().to_string())
            .join(beginn_ms.to_string())
    }

    fn strom_pfad(&self, session_id: SessionId, beginn_ms: i64, strom: &str) -> PathBuf {
        self.capture_verzeichnis(session_id, beginn_ms).join(strom)
    }

    /// Legt das Verzeichnis einer Aufzeichnung an
    pub async fn verzeichnis_anlegen(
        &self,
        session_id: SessionId,
        beginn_ms: i64,
    ) -> RelayResult<()> {
        let verzeichnis = self.capture_verzeichnis(session_id, beginn_ms);
        tokio::fs::create_dir_all(&verzeichnis).await?;
        tracing::debug!(pfad = %verzeichnis.display(), "Capture-Verzeichnis angelegt");
        Ok(())
    }

    /// Schreibt eine Strom-Datei komplett (ueberschreibt Vorhandenes)
    pub async fn schreiben(
        &self,
        session_id: SessionId,
        beginn_ms: i64,
        strom: &str,
        daten: &[u8],
    ) -> RelayResult<()> {
        let pfad = self.strom_pfad(session_id, beginn_ms, strom);
        if let Some(eltern) = pfad.parent() {
            tokio::fs::create_dir_all(eltern).await?;
        }
        tokio::fs::write(&pfad, daten).await?;
        tracing::debug!(pfad = %pfad.display(), bytes = daten.len(), "Artefakt geschrieben");
        Ok(())
    }

    /// Haengt Daten an eine Strom-Datei an (legt sie bei Bedarf an)
    pub async fn anhaengen(
        &self,
        session_id: SessionId,
        beginn_ms: i64,
        strom: &str,
        daten: &[u8],
    ) -> RelayResult<()> {
        let pfad = self.strom_pfad(session_id, beginn_ms, strom);
        if let Some(eltern) = pfad.parent() {
            tokio::fs::create_dir_all(eltern).await?;
        }
        let mut datei = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&pfad)
            .await?;
        datei.write_all(daten).await?;
        tracing::debug!(pfad = %pfad.display(), bytes = daten.len(), "Strom verlaengert");
        Ok(())
    }

    /// Liest eine Strom-Datei komplett
    pub async fn lesen(
        &self,
        session_id: SessionId,
        beginn_ms: i64,
        strom: &str,
    ) -> RelayResult<Vec<u8>> {
        let pfad = self.strom_pfad(session_id, beginn_ms, strom);
        let daten = tokio::fs::read(&pfad).await?;
        tracing::debug!(pfad = %pfad.display(), bytes = daten.len(), "Strom gelesen");
        Ok(daten)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ablage() -> (CaptureStorage, tempfile::TempDir) {
        let verzeichnis = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
        let ablage = CaptureStorage::neu(verzeichnis.path());
        (ablage, verzeichnis)
    }

    #[tokio::test]
    async fn schreiben_und_lesen() {
        let (ablage, _verzeichnis) = temp_ablage();

        ablage
            .schreiben(SessionId(5), 1000, STROM_DATEN, b"[]")
            .await
            .expect("Schreiben fehlgeschlagen");

        let gelesen = ablage.lesen(SessionId(5), 1000, STROM_DATEN).await.unwrap();
        assert_eq!(gelesen, b"[]");
    }

    #[tokio::test]
    async fn anhaengen_verlaengert_strom() {
        let (ablage, _verzeichnis) = temp_ablage();

        ablage
            .anhaengen(SessionId(5), 1000, STROM_POSITIONEN, &[1, 2])
            .await
            .unwrap();
        ablage
            .anhaengen(SessionId(5), 1000, STROM_POSITIONEN, &[3, 4])
            .await
            .unwrap();

        let gelesen = ablage
            .lesen(SessionId(5), 1000, STROM_POSITIONEN)
            .await
            .unwrap();
        assert_eq!(gelesen, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn captures_derselben_session_bleiben_getrennt() {
        let (ablage, _verzeichnis) = temp_ablage();

        ablage
            .schreiben(SessionId(5), 1000, STROM_DATEN, b"erste")
            .await
            .unwrap();
        ablage
            .schreiben(SessionId(5), 2000, STROM_DATEN, b"zweite")
            .await
            .unwrap();

        assert_eq!(
            ablage.lesen(SessionId(5), 1000, STROM_DATEN).await.unwrap(),
            b"erste"
        );
        assert_eq!(
            ablage.lesen(SessionId(5), 2000, STROM_DATEN).await.unwrap(),
            b"zweite"
        );
    }

    #[tokio::test]
    async fn verzeichnis_anlegen_baut_pfad() {
        let (ablage, verzeichnis) = temp_ablage();

        ablage.verzeichnis_anlegen(SessionId(7), 500).await.unwrap();
        assert!(verzeichnis.path().join("7").join("500").is_dir());
    }

    #[tokio::test]
    async fn lesen_fehlender_datei_ist_fehler() {
        let (ablage, _verzeichnis) = temp_ablage();
        assert!(ablage.lesen(SessionId(1), 1, STROM_DATEN).await.is_err());
    }
}

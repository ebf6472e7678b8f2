//! Aufzeichnung des Session-Ereignisstroms
//!
//! Waehrend einer Aufzeichnung sammelt die Session ihre Nachrichtenumschlaege
//! in einem Puffer und kodiert positionale Updates in die beiden
//! Legacy-Stroeme. `end_recording` persistiert den Nachrichtenpuffer als ein
//! JSON-Artefakt und spuelt die Strom-Reste; volle Schreibpuffer werden
//! bereits waehrend der Aufzeichnung vom Router rausgeschrieben.
//!
//! Start und Ende sind idempotent als No-Op: doppeltes Starten oder Beenden
//! aendert nichts und wird nur protokolliert.

use bytes::Bytes;
use seance_core::types::SessionId;
use seance_core::zeit::jetzt_ms;
use seance_db::AuditLog;
use seance_protocol::capture::{
    interaktion_kodieren, position_kodieren, SchreibPuffer, INT_PUFFER_RECORDS,
    INT_RECORD_GROESSE, POS_PUFFER_RECORDS, POS_RECORD_GROESSE,
};
use seance_protocol::RelayEnvelope;

use crate::state::RelayState;
use crate::storage::{STROM_DATEN, STROM_INTERAKTIONEN, STROM_POSITIONEN};

// ---------------------------------------------------------------------------
// CaptureZustand
// ---------------------------------------------------------------------------

/// Aufzeichnungszustand einer Session
///
/// Invariante: `capture_id` ist genau dann belegt wenn `aktiv` gesetzt ist.
#[derive(Debug)]
pub struct CaptureZustand {
    /// Ob gerade aufgezeichnet wird
    pub aktiv: bool,
    /// Aufzeichnungsbeginn in Unix-Millisekunden (0 wenn nicht aktiv)
    pub beginn_ms: i64,
    /// Capture-Kennung `<sessionId>_<beginn>`
    pub capture_id: Option<String>,
    nachrichten: Vec<RelayEnvelope>,
    pos_puffer: SchreibPuffer,
    int_puffer: SchreibPuffer,
}

impl CaptureZustand {
    /// Erstellt den Ausgangszustand (keine Aufzeichnung)
    pub fn neu() -> Self {
        Self {
            aktiv: false,
            beginn_ms: 0,
            capture_id: None,
            nachrichten: Vec::new(),
            pos_puffer: SchreibPuffer::neu(POS_RECORD_GROESSE, POS_PUFFER_RECORDS),
            int_puffer: SchreibPuffer::neu(INT_RECORD_GROESSE, INT_PUFFER_RECORDS),
        }
    }

    /// Beginnt eine Aufzeichnung und gibt die Capture-Kennung zurueck
    pub fn starten(&mut self, session_id: SessionId, beginn_ms: i64) -> String {
        let capture_id = format!("{}_{}", session_id.inner(), beginn_ms);
        self.aktiv = true;
        self.beginn_ms = beginn_ms;
        self.capture_id = Some(capture_id.clone());
        self.nachrichten.clear();
        capture_id
    }

    /// Beendet die Aufzeichnung und entnimmt alles Gepufferte
    ///
    /// Die Capture-Kennung wird dabei bedingungslos geleert. Gibt `None`
    /// zurueck wenn gar keine Aufzeichnung laeuft.
    pub fn beenden(&mut self) -> Option<CaptureAbschluss> {
        if !self.aktiv {
            return None;
        }
        self.aktiv = false;
        let capture_id = self.capture_id.take().unwrap_or_default();
        let beginn_ms = self.beginn_ms;
        self.beginn_ms = 0;
        Some(CaptureAbschluss {
            capture_id,
            beginn_ms,
            nachrichten: std::mem::take(&mut self.nachrichten),
            pos_rest: self.pos_puffer.leeren(),
            int_rest: self.int_puffer.leeren(),
        })
    }

    /// Stempelt einen Umschlag mit Sequenznummer und Capture-Kennung und
    /// haengt ihn an den Nachrichtenpuffer
    ///
    /// Die Sequenznummer ist die sessionrelative Ereigniszeit; fehlt der
    /// Client-Zeitstempel, zaehlt die Empfangszeit.
    pub fn nachricht_puffern(&mut self, mut umschlag: RelayEnvelope, empfangen_ms: i64) {
        let ereignis_ms = umschlag.ts.unwrap_or(empfangen_ms);
        umschlag.seq = Some(ereignis_ms - self.beginn_ms);
        umschlag.capture_id = self.capture_id.clone();
        self.nachrichten.push(umschlag);
    }

    /// Kodiert eine `update`-Liste in den Positions-Strom
    ///
    /// Gibt einen vollen Pufferinhalt zur Persistierung zurueck, wenn das
    /// Anhaengen den Schreibpuffer ueberlaufen liesse. Listen mit falscher
    /// Aritaet werden ignoriert.
    pub fn position_puffern(&mut self, felder: &[f64], empfangen_ms: i64) -> Option<Bytes> {
        let seq = (empfangen_ms - self.beginn_ms) as f32;
        let record = position_kodieren(felder, seq)?;
        self.pos_puffer.anhaengen(&record)
    }

    /// Kodiert eine `interact`-Liste in den Interaktions-Strom
    pub fn interaktion_puffern(&mut self, felder: &[i64], empfangen_ms: i64) -> Option<Bytes> {
        let seq = (empfangen_ms - self.beginn_ms) as i32;
        let record = interaktion_kodieren(felder, seq)?;
        self.int_puffer.anhaengen(&record)
    }

    /// Anzahl der gepufferten Nachrichtenumschlaege
    pub fn nachrichten_anzahl(&self) -> usize {
        self.nachrichten.len()
    }
}

impl Default for CaptureZustand {
    fn default() -> Self {
        Self::neu()
    }
}

/// Beim Beenden einer Aufzeichnung entnommener Pufferinhalt
#[derive(Debug)]
pub struct CaptureAbschluss {
    pub capture_id: String,
    pub beginn_ms: i64,
    pub nachrichten: Vec<RelayEnvelope>,
    pub pos_rest: Option<Bytes>,
    pub int_rest: Option<Bytes>,
}

// ---------------------------------------------------------------------------
// Operationen
// ---------------------------------------------------------------------------

/// Startet die Aufzeichnung einer Session
///
/// No-Op mit Warnung wenn die Session fehlt oder bereits aufzeichnet.
pub async fn aufzeichnung_starten<A: AuditLog>(state: &RelayState<A>, session_id: SessionId) {
    let jetzt = jetzt_ms();
    let capture_id = match state.registry.mit_session_mut(&session_id, |session| {
        if session.aufzeichnung.aktiv {
            None
        } else {
            Some(session.aufzeichnung.starten(session_id, jetzt))
        }
    }) {
        None => {
            tracing::warn!(session_id = %session_id, "Aufzeichnungsstart fuer unbekannte Session");
            return;
        }
        Some(None) => {
            tracing::warn!(session_id = %session_id, "Aufzeichnung laeuft bereits");
            return;
        }
        Some(Some(capture_id)) => capture_id,
    };

    // Ablageverzeichnis anlegen; ein Fehler dort beendet die Aufzeichnung nicht
    if let Err(e) = state.storage.verzeichnis_anlegen(session_id, jetzt).await {
        tracing::error!(
            session_id = %session_id,
            fehler = %e,
            "Capture-Verzeichnis konnte nicht angelegt werden"
        );
    }

    if let Err(e) = state
        .audit
        .capture_start_protokollieren(&capture_id, session_id, jetzt)
        .await
    {
        tracing::error!(
            capture_id = %capture_id,
            fehler = %e,
            "Audit-Eintrag fuer Aufzeichnungsstart fehlgeschlagen"
        );
    }

    tracing::info!(session_id = %session_id, capture_id = %capture_id, "Aufzeichnung gestartet");
}

/// Beendet die Aufzeichnung einer Session und persistiert die Artefakte
///
/// No-Op mit Warnung wenn die Session fehlt oder nicht aufzeichnet.
pub async fn aufzeichnung_beenden<A: AuditLog>(state: &RelayState<A>, session_id: SessionId) {
    let abschluss = match state
        .registry
        .mit_session_mut(&session_id, |session| session.aufzeichnung.beenden())
    {
        None => {
            tracing::warn!(session_id = %session_id, "Aufzeichnungsende fuer unbekannte Session");
            return;
        }
        Some(None) => {
            tracing::warn!(session_id = %session_id, "Keine aktive Aufzeichnung");
            return;
        }
        Some(Some(abschluss)) => abschluss,
    };

    abschluss_persistieren(state, session_id, abschluss).await;
}

/// Schreibt die Artefakte eines beendeten Captures und meldet das Ende an
/// die Audit-Senke
///
/// Jeder Schreibfehler wird protokolliert und absorbiert; die uebrigen
/// Artefakte werden trotzdem geschrieben.
pub(crate) async fn abschluss_persistieren<A: AuditLog>(
    state: &RelayState<A>,
    session_id: SessionId,
    abschluss: CaptureAbschluss,
) {
    let ende = jetzt_ms();
    let anzahl = abschluss.nachrichten.len();

    match serde_json::to_vec(&abschluss.nachrichten) {
        Ok(daten) => {
            if let Err(e) = state
                .storage
                .schreiben(session_id, abschluss.beginn_ms, STROM_DATEN, &daten)
                .await
            {
                tracing::error!(
                    capture_id = %abschluss.capture_id,
                    fehler = %e,
                    "Capture-Artefakt konnte nicht geschrieben werden"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                capture_id = %abschluss.capture_id,
                fehler = %e,
                "Nachrichtenpuffer nicht serialisierbar"
            );
        }
    }

    if let Some(rest) = abschluss.pos_rest {
        if let Err(e) = state
            .storage
            .anhaengen(session_id, abschluss.beginn_ms, STROM_POSITIONEN, &rest)
            .await
        {
            tracing::error!(
                capture_id = %abschluss.capture_id,
                fehler = %e,
                "Positions-Strom konnte nicht gespuelt werden"
            );
        }
    }

    if let Some(rest) = abschluss.int_rest {
        if let Err(e) = state
            .storage
            .anhaengen(session_id, abschluss.beginn_ms, STROM_INTERAKTIONEN, &rest)
            .await
        {
            tracing::error!(
                capture_id = %abschluss.capture_id,
                fehler = %e,
                "Interaktions-Strom konnte nicht gespuelt werden"
            );
        }
    }

    if let Err(e) = state
        .audit
        .capture_ende_protokollieren(&abschluss.capture_id, ende)
        .await
    {
        tracing::error!(
            capture_id = %abschluss.capture_id,
            fehler = %e,
            "Audit-Eintrag fuer Aufzeichnungsende fehlgeschlagen"
        );
    }

    tracing::info!(
        session_id = %session_id,
        capture_id = %abschluss.capture_id,
        nachrichten = anzahl,
        "Aufzeichnung beendet"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use seance_protocol::capture::positionen_dekodieren;
    use serde_json::json;

    fn umschlag_mit_ts(ts: i64) -> RelayEnvelope {
        RelayEnvelope {
            session_id: Some(SessionId(5)),
            client_id: Some(seance_core::types::ClientId(9)),
            typ: Some("interaction".into()),
            message: Some(json!([0, 5, 9, 1, 42, 8])),
            ts: Some(ts),
            seq: None,
            capture_id: None,
        }
    }

    #[test]
    fn starten_setzt_kennung_und_beginn() {
        let mut zustand = CaptureZustand::neu();
        let capture_id = zustand.starten(SessionId(5), 1000);

        assert_eq!(capture_id, "5_1000");
        assert!(zustand.aktiv);
        assert_eq!(zustand.beginn_ms, 1000);
        assert_eq!(zustand.capture_id.as_deref(), Some("5_1000"));
    }

    #[test]
    fn beenden_entnimmt_puffer_und_leert_kennung() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 1000);
        zustand.nachricht_puffern(umschlag_mit_ts(1250), 1300);

        let abschluss = zustand.beenden().expect("Aufzeichnung lief");
        assert_eq!(abschluss.capture_id, "5_1000");
        assert_eq!(abschluss.beginn_ms, 1000);
        assert_eq!(abschluss.nachrichten.len(), 1);
        assert!(!zustand.aktiv);
        assert!(zustand.capture_id.is_none());
        assert_eq!(zustand.nachrichten_anzahl(), 0);
    }

    #[test]
    fn beenden_ohne_aufzeichnung_ist_none() {
        let mut zustand = CaptureZustand::neu();
        assert!(zustand.beenden().is_none());

        zustand.starten(SessionId(1), 0);
        assert!(zustand.beenden().is_some());
        // Zweites Beenden ohne neuen Start bleibt No-Op
        assert!(zustand.beenden().is_none());
    }

    #[test]
    fn nachricht_puffern_stempelt_seq_und_kennung() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 1000);
        zustand.nachricht_puffern(umschlag_mit_ts(1250), 9999);

        let abschluss = zustand.beenden().unwrap();
        let gepuffert = &abschluss.nachrichten[0];
        assert_eq!(gepuffert.seq, Some(250), "seq = ts - beginn");
        assert_eq!(gepuffert.capture_id.as_deref(), Some("5_1000"));
    }

    #[test]
    fn nachricht_ohne_ts_nutzt_empfangszeit() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 1000);
        let mut umschlag = umschlag_mit_ts(0);
        umschlag.ts = None;
        zustand.nachricht_puffern(umschlag, 1400);

        let abschluss = zustand.beenden().unwrap();
        assert_eq!(abschluss.nachrichten[0].seq, Some(400));
    }

    #[test]
    fn position_puffern_ueberschreibt_sequenzfeld() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 1000);

        let mut felder = vec![0.0f64; 14];
        felder[13] = 777.0;
        assert!(zustand.position_puffern(&felder, 1120).is_none());

        let rest = zustand.beenden().unwrap().pos_rest.expect("Rest vorhanden");
        let records = positionen_dekodieren(&rest).unwrap();
        assert_eq!(records[0][13], 120.0);
    }

    #[test]
    fn position_puffern_spuelt_bei_ueberlauf() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 0);
        let felder = vec![0.0f64; 14];

        let mut chunks = 0;
        for i in 0..=POS_PUFFER_RECORDS {
            if let Some(chunk) = zustand.position_puffern(&felder, i as i64) {
                chunks += 1;
                assert_eq!(chunk.len(), POS_PUFFER_RECORDS * POS_RECORD_GROESSE);
            }
        }
        assert_eq!(chunks, 1, "genau ein Flush beim Ueberlauf");

        let rest = zustand.beenden().unwrap().pos_rest.expect("ein Record Rest");
        assert_eq!(rest.len(), POS_RECORD_GROESSE);
    }

    #[test]
    fn falsche_aritaet_wird_ignoriert() {
        let mut zustand = CaptureZustand::neu();
        zustand.starten(SessionId(5), 0);

        assert!(zustand.position_puffern(&[1.0, 2.0], 10).is_none());
        assert!(zustand.interaktion_puffern(&[1, 2, 3], 10).is_none());

        let abschluss = zustand.beenden().unwrap();
        assert!(abschluss.pos_rest.is_none());
        assert!(abschluss.int_rest.is_none());
    }
}

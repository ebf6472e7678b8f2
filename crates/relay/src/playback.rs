//! Wiedergabe – Spielt aufgezeichnete Stroeme in eine laufende Session
//!
//! Positions- und Interaktionsstrom laufen als eigene Tasks mit eigenem
//! Endsignal (`playbackEnd`, `interactionPlaybackEnd`). Der Zeitplan haengt
//! an einem monotonen Anker: jeder Datensatz wird bei Anker plus
//! Sequenzversatz freigegeben, unabhaengig von der Dauer der Zustellung.
//! Verschwindet die Ziel-Session waehrend der Wiedergabe, endet der Task
//! still und ohne Endsignal.

use seance_core::types::{SessionId, SocketId};
use seance_db::AuditLog;
use seance_protocol::capture::{
    interaktionen_dekodieren, positionen_dekodieren, INT_SEQ, POS_CLIENT, POS_ENTITAETSTYP,
    POS_ENTITY, POS_SEQ,
};
use seance_protocol::events::{WiedergabeAnfrage, ENTITAETSTYP_OBJEKTE};
use seance_protocol::ServerEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::state::RelayState;
use crate::storage::{STROM_INTERAKTIONEN, STROM_POSITIONEN};

/// Versatz fuer Client- und Entity-Kennungen wiedergegebener Datensaetze
///
/// Nicht-Objekt-Datensaetze bekommen beim Abspielen verschobene Kennungen,
/// damit sie nicht mit live verbundenen Clients der Session kollidieren.
const WIEDERGABE_ID_VERSATZ: f64 = 90000.0;

// ---------------------------------------------------------------------------
// WiedergabeId
// ---------------------------------------------------------------------------

/// Quell-Aufzeichnung einer Wiedergabe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiedergabeId {
    pub session_id: SessionId,
    pub beginn_ms: i64,
}

impl WiedergabeId {
    /// Zerlegt eine Aufzeichnungs-Kennung der Form `<session>_<beginn>`
    pub fn parsen(roh: &str) -> Option<Self> {
        let mut teile = roh.split('_');
        let session = teile.next()?.parse::<i64>().ok()?;
        let beginn = teile.next()?.parse::<i64>().ok()?;
        if teile.next().is_some() {
            return None;
        }
        Some(Self {
            session_id: SessionId(session),
            beginn_ms: beginn,
        })
    }
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Startet die Wiedergabe einer Aufzeichnung in die Ziel-Session
///
/// Unvollstaendige Anfragen, unbekannte Ziel-Sessions und unlesbare
/// Kennungen brechen still ab; der Anfragende erhaelt keinen Fehler.
pub async fn wiedergabe_starten<A: AuditLog + 'static>(
    state: &Arc<RelayState<A>>,
    socket: SocketId,
    anfrage: WiedergabeAnfrage,
) {
    let (roh_id, ziel) = match (&anfrage.playback_id, anfrage.session_id, anfrage.client_id) {
        (Some(roh_id), Some(ziel), Some(_)) => (roh_id, ziel),
        _ => {
            tracing::warn!(socket_id = %socket, "Wiedergabeanfrage ohne playbackId, sessionId oder clientId");
            return;
        }
    };
    if !state.registry.existiert(&ziel) {
        tracing::warn!(session_id = %ziel, "Wiedergabe fuer unbekannte Ziel-Session");
        return;
    }
    let Some(quelle) = WiedergabeId::parsen(roh_id) else {
        tracing::warn!(playback_id = %roh_id, "Wiedergabe-Kennung nicht lesbar");
        return;
    };

    tracing::info!(
        session_id = %ziel,
        quelle = %roh_id,
        "Wiedergabe gestartet"
    );

    let pos_state = Arc::clone(state);
    tokio::spawn(async move {
        positionen_abspielen(pos_state, quelle, ziel).await;
    });

    let int_state = Arc::clone(state);
    tokio::spawn(async move {
        interaktionen_abspielen(int_state, quelle, ziel).await;
    });
}

// ---------------------------------------------------------------------------
// Strom-Tasks
// ---------------------------------------------------------------------------

/// Spielt den Positionsstrom einer Aufzeichnung ab
async fn positionen_abspielen<A: AuditLog>(
    state: Arc<RelayState<A>>,
    quelle: WiedergabeId,
    ziel: SessionId,
) {
    let daten = match state
        .storage
        .lesen(quelle.session_id, quelle.beginn_ms, STROM_POSITIONEN)
        .await
    {
        Ok(daten) => daten,
        Err(e) => {
            tracing::warn!(session_id = %ziel, fehler = %e, "Positionsstrom nicht lesbar");
            state
                .broadcaster
                .an_raum_senden(&ziel, ServerEvent::PlaybackEnd);
            return;
        }
    };
    let records = match positionen_dekodieren(&daten) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(session_id = %ziel, fehler = %e, "Positionsstrom beschaedigt");
            state
                .broadcaster
                .an_raum_senden(&ziel, ServerEvent::PlaybackEnd);
            return;
        }
    };

    let anker = Instant::now();
    for record in records {
        let versatz = record[POS_SEQ].max(0.0) as u64;
        tokio::time::sleep_until(anker + Duration::from_millis(versatz)).await;

        if !state.registry.existiert(&ziel) {
            tracing::debug!(session_id = %ziel, "Ziel-Session waehrend der Wiedergabe entfernt");
            return;
        }

        let mut felder: Vec<f64> = record.iter().map(|&f| f64::from(f)).collect();
        if felder[POS_ENTITAETSTYP] as i64 != ENTITAETSTYP_OBJEKTE {
            felder[POS_CLIENT] += WIEDERGABE_ID_VERSATZ;
            felder[POS_ENTITY] += WIEDERGABE_ID_VERSATZ;
        }

        state
            .broadcaster
            .an_raum_senden(&ziel, ServerEvent::RelayUpdate(felder));
    }

    state
        .broadcaster
        .an_raum_senden(&ziel, ServerEvent::PlaybackEnd);
    tracing::debug!(session_id = %ziel, "Positions-Wiedergabe beendet");
}

/// Spielt den Interaktionsstrom einer Aufzeichnung ab
async fn interaktionen_abspielen<A: AuditLog>(
    state: Arc<RelayState<A>>,
    quelle: WiedergabeId,
    ziel: SessionId,
) {
    let daten = match state
        .storage
        .lesen(quelle.session_id, quelle.beginn_ms, STROM_INTERAKTIONEN)
        .await
    {
        Ok(daten) => daten,
        Err(e) => {
            tracing::warn!(session_id = %ziel, fehler = %e, "Interaktionsstrom nicht lesbar");
            state
                .broadcaster
                .an_raum_senden(&ziel, ServerEvent::InteractionPlaybackEnd);
            return;
        }
    };
    let records = match interaktionen_dekodieren(&daten) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(session_id = %ziel, fehler = %e, "Interaktionsstrom beschaedigt");
            state
                .broadcaster
                .an_raum_senden(&ziel, ServerEvent::InteractionPlaybackEnd);
            return;
        }
    };

    let anker = Instant::now();
    for record in records {
        let versatz = record[INT_SEQ].max(0) as u64;
        tokio::time::sleep_until(anker + Duration::from_millis(versatz)).await;

        if !state.registry.existiert(&ziel) {
            tracing::debug!(session_id = %ziel, "Ziel-Session waehrend der Wiedergabe entfernt");
            return;
        }

        let felder: Vec<i64> = record.iter().map(|&v| i64::from(v)).collect();
        state
            .broadcaster
            .an_raum_senden(&ziel, ServerEvent::InteractionUpdate(felder));
    }

    state
        .broadcaster
        .an_raum_senden(&ziel, ServerEvent::InteractionPlaybackEnd);
    tracing::debug!(session_id = %ziel, "Interaktions-Wiedergabe beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

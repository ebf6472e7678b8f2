//! Nachrichten-Router – Weitergabe, Zustandsprojektion und Aufzeichnung
//!
//! Alle Relay-Pfade folgen derselben Reihenfolge: Adressfelder pruefen,
//! unveraendert an die uebrigen Raum-Mitglieder weiterreichen, dann erst
//! parsen, projizieren und aufzeichnen. Fehler hinter der Weitergabe
//! betreffen nur Projektion und Aufzeichnung.

use seance_core::types::{ClientId, EntityId, SessionId, SocketId};
use seance_core::zeit::jetzt_ms;
use seance_db::AuditLog;
use seance_protocol::capture::{INT_FELDER, POS_FELDER};
use seance_protocol::events::{
    InteraktionsTyp, NachrichtTyp, RelayEnvelope, ZustandsAnfrage, ENTITAETSTYP_OBJEKTE,
    INTERAKTION_ARITAET, LISTE_CLIENT, LISTE_SESSION, NACHRICHT_TYP, NACHRICHT_ZIEL, SYNC_ENTITY,
    SYNC_MINDEST_ARITAET, SYNC_TYP, UPDATE_ENTITAETSTYP, UPDATE_ENTITY, UPDATE_MINDEST_ARITAET,
};
use seance_protocol::ServerEvent;
use serde_json::Value;

use crate::entities::EntityPatch;
use crate::session::Session;
use crate::state::RelayState;
use crate::storage::{STROM_INTERAKTIONEN, STROM_POSITIONEN};

/// Liest einen JSON-Wert als Ganzzahl; Gleitkommazahlen werden abgeschnitten
fn wert_als_i64(wert: &Value) -> Option<i64> {
    wert.as_i64().or_else(|| wert.as_f64().map(|f| f as i64))
}

// ---------------------------------------------------------------------------
// Relay-Nachrichten (message)
// ---------------------------------------------------------------------------

/// Verarbeitet eine Relay-Nachricht
///
/// Weitergereicht wird die Originalform; String-Payloads werden erst
/// danach geparst und auf den Session-Zustand angewendet. Laeuft eine
/// Aufzeichnung, landet der Umschlag zusaetzlich im Nachrichtenpuffer.
pub fn nachricht_verarbeiten<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    mut umschlag: RelayEnvelope,
) {
    let (session_id, client_id) = match (umschlag.session_id, umschlag.client_id) {
        (Some(session_id), Some(client_id)) => (session_id, client_id),
        _ => {
            tracing::warn!(socket_id = %socket, "Relay-Nachricht ohne sessionId oder clientId verworfen");
            return;
        }
    };
    if umschlag.typ.is_none() {
        tracing::warn!(session_id = %session_id, client_id = %client_id, "Relay-Nachricht ohne Typ verworfen");
        return;
    }
    if umschlag.payload_leer() {
        tracing::warn!(session_id = %session_id, client_id = %client_id, "Relay-Nachricht ohne Inhalt verworfen");
        return;
    }

    match state
        .registry
        .mit_session(&session_id, |session| session.ist_mitglied(client_id))
    {
        None => {
            tracing::warn!(session_id = %session_id, "Relay-Nachricht fuer unbekannte Session verworfen");
            return;
        }
        Some(false) => {
            tracing::warn!(session_id = %session_id, client_id = %client_id, "Absender ist kein Mitglied der Session");
            return;
        }
        Some(true) => {}
    }

    state.broadcaster.an_raum_ausser_senden(
        &session_id,
        &socket,
        ServerEvent::Message(umschlag.clone()),
    );

    if let Err(e) = umschlag.nachricht_parsen() {
        tracing::warn!(
            session_id = %session_id,
            client_id = %client_id,
            fehler = %e,
            "Nachrichten-Payload nicht parsebar"
        );
        return;
    }

    let verarbeitet = state.registry.mit_session_mut(&session_id, |session| {
        match umschlag.nachricht_typ() {
            NachrichtTyp::Interaction => interaktion_projizieren(session, &umschlag),
            NachrichtTyp::Sync => sync_projizieren(session, &umschlag),
            NachrichtTyp::Unbekannt => {
                tracing::debug!(
                    session_id = %session_id,
                    typ = umschlag.typ.as_deref().unwrap_or(""),
                    "Nachrichtentyp ohne Projektion"
                );
            }
        }

        if session.aufzeichnung.aktiv {
            session
                .aufzeichnung
                .nachricht_puffern(umschlag.clone(), jetzt_ms());
        }
    });
    if verarbeitet.is_none() {
        tracing::debug!(session_id = %session_id, "Session waehrend der Verarbeitung entfernt");
    }
}

/// Wendet eine Interaktionsnachricht auf den Session-Zustand an
fn interaktion_projizieren(session: &mut Session, umschlag: &RelayEnvelope) {
    let Some(liste) = umschlag.payload_liste() else {
        tracing::warn!(session_id = %session.id, "Interaktions-Payload ist keine Liste");
        return;
    };
    if liste.len() != INTERAKTION_ARITAET {
        tracing::warn!(
            session_id = %session.id,
            laenge = liste.len(),
            "Interaktions-Payload mit unerwarteter Laenge"
        );
        return;
    }
    let (Some(ziel), Some(typ_code)) = (
        wert_als_i64(&liste[NACHRICHT_ZIEL]),
        wert_als_i64(&liste[NACHRICHT_TYP]),
    ) else {
        tracing::warn!(session_id = %session.id, "Interaktions-Payload ohne Ziel oder Typ");
        return;
    };

    match InteraktionsTyp::aus_code(typ_code) {
        InteraktionsTyp::Render => {
            session
                .entities
                .anwenden(EntityId(ziel), EntityPatch::render(true));
        }
        InteraktionsTyp::RenderEnd => {
            session
                .entities
                .anwenden(EntityId(ziel), EntityPatch::render(false));
        }
        InteraktionsTyp::SceneChange => {
            session.scene = Some(ziel);
            tracing::info!(session_id = %session.id, szene = ziel, "Szenenwechsel");
        }
        InteraktionsTyp::Lock => {
            session
                .entities
                .anwenden(EntityId(ziel), EntityPatch::gesperrt(true));
        }
        InteraktionsTyp::LockEnd => {
            session
                .entities
                .anwenden(EntityId(ziel), EntityPatch::gesperrt(false));
        }
        // Reine Relay-Interaktionen ohne Zustandswirkung
        InteraktionsTyp::Look
        | InteraktionsTyp::LookEnd
        | InteraktionsTyp::Grab
        | InteraktionsTyp::GrabEnd
        | InteraktionsTyp::Unset => {}
        InteraktionsTyp::Unbekannt(code) => {
            tracing::debug!(session_id = %session.id, code, "Unbekannter Interaktionstyp");
        }
    }
}

/// Ersetzt den letzten bekannten Zustand einer Objekt-Entity
fn sync_projizieren(session: &mut Session, umschlag: &RelayEnvelope) {
    let Some(liste) = umschlag.payload_liste() else {
        return;
    };
    if liste.len() < SYNC_MINDEST_ARITAET {
        return;
    }
    if wert_als_i64(&liste[SYNC_TYP]) != Some(ENTITAETSTYP_OBJEKTE) {
        return;
    }
    let Some(entity_id) = wert_als_i64(&liste[SYNC_ENTITY]) else {
        return;
    };

    if let Some(nachricht) = &umschlag.message {
        session
            .entities
            .latest_ersetzen(EntityId(entity_id), nachricht.clone());
    }
}

// ---------------------------------------------------------------------------
// Transformations-Updates (update)
// ---------------------------------------------------------------------------

/// Verarbeitet einen Transformations-Update
///
/// Die Zahlenliste geht unveraendert an die uebrigen Mitglieder; Eintraege
/// vom Objekt-Typ ersetzen zusaetzlich den letzten Entity-Zustand, und
/// waehrend einer Aufzeichnung landen vollstaendige Datensaetze im
/// Positionsstrom.
pub async fn update_verarbeiten<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    liste: Vec<f64>,
) {
    if liste.len() < 3 {
        tracing::warn!(socket_id = %socket, laenge = liste.len(), "Update-Liste zu kurz");
        return;
    }
    let session_id = SessionId(liste[LISTE_SESSION] as i64);
    let client_id = ClientId(liste[LISTE_CLIENT] as i64);

    match state
        .registry
        .mit_session(&session_id, |session| session.ist_mitglied(client_id))
    {
        None => {
            tracing::warn!(session_id = %session_id, "Update fuer unbekannte Session verworfen");
            return;
        }
        Some(false) => {
            tracing::warn!(session_id = %session_id, client_id = %client_id, "Absender ist kein Mitglied der Session");
            return;
        }
        Some(true) => {}
    }

    state.broadcaster.an_raum_ausser_senden(
        &session_id,
        &socket,
        ServerEvent::RelayUpdate(liste.clone()),
    );

    // Projektion und Pufferung unter einem Guard, Disk-I/O danach
    let flush = state
        .registry
        .mit_session_mut(&session_id, |session| {
            if liste.len() >= UPDATE_MINDEST_ARITAET
                && liste[UPDATE_ENTITAETSTYP] as i64 == ENTITAETSTYP_OBJEKTE
            {
                let entity_id = EntityId(liste[UPDATE_ENTITY] as i64);
                match serde_json::to_value(&liste) {
                    Ok(wert) => session.entities.latest_ersetzen(entity_id, wert),
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, fehler = %e, "Update-Liste nicht serialisierbar");
                    }
                }
            }

            if session.aufzeichnung.aktiv && liste.len() == POS_FELDER {
                let beginn = session.aufzeichnung.beginn_ms;
                session
                    .aufzeichnung
                    .position_puffern(&liste, jetzt_ms())
                    .map(|chunk| (chunk, beginn))
            } else {
                None
            }
        })
        .flatten();

    if let Some((chunk, beginn_ms)) = flush {
        if let Err(e) = state
            .storage
            .anhaengen(session_id, beginn_ms, STROM_POSITIONEN, &chunk)
            .await
        {
            tracing::error!(session_id = %session_id, fehler = %e, "Positionsstrom konnte nicht geschrieben werden");
        }
    }
}

// ---------------------------------------------------------------------------
// Interaktions-Updates (interact)
// ---------------------------------------------------------------------------

/// Verarbeitet einen Interaktions-Update
///
/// Reine Weitergabe ohne Projektion; waehrend einer Aufzeichnung landen
/// vollstaendige Datensaetze im Interaktionsstrom.
pub async fn interaktion_verarbeiten<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    liste: Vec<i64>,
) {
    if liste.len() < 3 {
        tracing::warn!(socket_id = %socket, laenge = liste.len(), "Interaktionsliste zu kurz");
        return;
    }
    let session_id = SessionId(liste[LISTE_SESSION]);
    let client_id = ClientId(liste[LISTE_CLIENT]);

    match state
        .registry
        .mit_session(&session_id, |session| session.ist_mitglied(client_id))
    {
        None => {
            tracing::warn!(session_id = %session_id, "Interaktion fuer unbekannte Session verworfen");
            return;
        }
        Some(false) => {
            tracing::warn!(session_id = %session_id, client_id = %client_id, "Absender ist kein Mitglied der Session");
            return;
        }
        Some(true) => {}
    }

    state.broadcaster.an_raum_ausser_senden(
        &session_id,
        &socket,
        ServerEvent::InteractionUpdate(liste.clone()),
    );

    let flush = state
        .registry
        .mit_session_mut(&session_id, |session| {
            if session.aufzeichnung.aktiv && liste.len() == INT_FELDER {
                let beginn = session.aufzeichnung.beginn_ms;
                session
                    .aufzeichnung
                    .interaktion_puffern(&liste, jetzt_ms())
                    .map(|chunk| (chunk, beginn))
            } else {
                None
            }
        })
        .flatten();

    if let Some((chunk, beginn_ms)) = flush {
        if let Err(e) = state
            .storage
            .anhaengen(session_id, beginn_ms, STROM_INTERAKTIONEN, &chunk)
            .await
        {
            tracing::error!(session_id = %session_id, fehler = %e, "Interaktionsstrom konnte nicht geschrieben werden");
        }
    }
}

// ---------------------------------------------------------------------------
// Zeichen-Ereignisse (draw)
// ---------------------------------------------------------------------------

/// Reicht ein Zeichen-Ereignis unveraendert an die uebrigen Mitglieder weiter
///
/// Geprueft werden nur die Adressfelder; die Session muss nicht in der
/// Registry stehen.
pub fn draw_weiterleiten<A: AuditLog>(state: &RelayState<A>, socket: SocketId, liste: Vec<Value>) {
    let Some(session_id) = liste.get(LISTE_SESSION).and_then(wert_als_i64) else {
        tracing::error!(socket_id = %socket, "Zeichen-Ereignis ohne Session-Kennung");
        return;
    };
    if liste.get(LISTE_CLIENT).and_then(wert_als_i64).is_none() {
        tracing::warn!(socket_id = %socket, session_id, "Zeichen-Ereignis ohne Client-Kennung");
        return;
    }

    state
        .broadcaster
        .an_raum_ausser_senden(&SessionId(session_id), &socket, ServerEvent::Draw(liste));
}

// ---------------------------------------------------------------------------
// Zustands- und Session-Auskunft
// ---------------------------------------------------------------------------

/// Beantwortet eine Zustandsanfrage mit dem Momentbild der Session
///
/// Die Anfrage verlangt keine Mitgliedschaft; Session und Client muessen
/// nur benannt sein und die Session existieren.
pub fn zustand_senden<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    anfrage: ZustandsAnfrage,
) {
    let session_id = match (anfrage.session_id, anfrage.client_id) {
        (Some(session_id), Some(_)) => session_id,
        _ => {
            tracing::warn!(socket_id = %socket, "Zustandsanfrage ohne sessionId oder clientId");
            state.broadcaster.an_socket_senden(
                &socket,
                ServerEvent::fehler("sessionId oder clientId fehlt"),
            );
            return;
        }
    };

    match state
        .registry
        .mit_session(&session_id, |session| session.snapshot(anfrage.version))
    {
        Some(zustand) => {
            state
                .broadcaster
                .an_socket_senden(&socket, ServerEvent::State(zustand));
        }
        None => {
            tracing::warn!(session_id = %session_id, "Zustandsanfrage fuer unbekannte Session");
            state
                .broadcaster
                .an_socket_senden(&socket, ServerEvent::fehler("Session unbekannt"));
        }
    }
}

/// Beantwortet eine sessionInfo-Anfrage an den anfragenden Socket
pub fn session_info_senden<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    session_id: SessionId,
) {
    match state
        .registry
        .mit_session(&session_id, |session| session.details())
    {
        Some(details) => {
            state
                .broadcaster
                .an_socket_senden(&socket, ServerEvent::SessionInfo(details));
        }
        None => {
            tracing::warn!(session_id = %session_id, "sessionInfo fuer unbekannte Session");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

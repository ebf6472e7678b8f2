//! Verbindungs-Lebenszyklus – Beitritt, Verdraengung, Reconnect, Trennung
//!
//! ## Verdraengung (Bump)
//! Tritt ein Client bei, dessen ID bereits auf andere Sockets der Session
//! zeigt, verlieren diese Sockets sofort Zuordnung und Roster-Eintrag und
//! den Raum; endgueltig getrennt werden sie erst nach einer Karenzzeit,
//! damit laufende Schreibvorgaenge der alten Verbindung noch landen.
//! Die spaetere Trennungsmeldung eines verdraengten Sockets findet keine
//! Zuordnung mehr vor und verlaeuft im Leeren.
//!
//! ## Trenngruende
//! Das Vokabular ist das des Transports. Nur der Ping-Timeout und
//! unbekannte Gruende loesen einen Reconnect-Versuch aus; dabei bleiben
//! Roster und Socket-Zuordnung erhalten und der Raum wird nicht
//! benachrichtigt.

use seance_core::types::{ClientId, SessionId, SocketId};
use seance_core::zeit::jetzt_ms;
use seance_db::{AuditLog, VerbindungsEvent};
use seance_protocol::events::{BeitrittsAnfrage, SessionMitglied};
use seance_protocol::ServerEvent;
use std::time::Duration;

use crate::recording;
use crate::state::RelayState;

// ---------------------------------------------------------------------------
// TrennGrund
// ---------------------------------------------------------------------------

/// Grund einer Verbindungstrennung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrennGrund {
    /// Server hat die Verbindung beendet (Verdraengung, Shutdown)
    ServerTrennung,
    /// Sauberer Abschied des Clients (`disconnect`-Event)
    ClientTrennung,
    /// Transport wurde geschlossen (EOF)
    TransportGeschlossen,
    /// Lese- oder Schreibfehler auf dem Transport
    TransportFehler,
    /// Keepalive abgelaufen
    PingZeitlimit,
    /// Grund ausserhalb des bekannten Vokabulars
    Unbekannt(String),
}

impl TrennGrund {
    /// Ordnet den Wire-String dem Trenngrund zu
    pub fn aus_str(roh: &str) -> Self {
        match roh {
            "server namespace disconnect" => Self::ServerTrennung,
            "client namespace disconnect" => Self::ClientTrennung,
            "transport close" => Self::TransportGeschlossen,
            "transport error" => Self::TransportFehler,
            "ping timeout" => Self::PingZeitlimit,
            andere => Self::Unbekannt(andere.to_string()),
        }
    }

    /// Wire-Name des Grundes
    pub fn als_str(&self) -> &str {
        match self {
            Self::ServerTrennung => "server namespace disconnect",
            Self::ClientTrennung => "client namespace disconnect",
            Self::TransportGeschlossen => "transport close",
            Self::TransportFehler => "transport error",
            Self::PingZeitlimit => "ping timeout",
            Self::Unbekannt(roh) => roh,
        }
    }

    /// Ob nach diesem Grund ein Reconnect versucht wird
    ///
    /// Nur der Ping-Timeout des bekannten Vokabulars ist reconnect-faehig;
    /// unbekannte Gruende gelten ebenfalls als reconnect-faehig.
    pub fn ist_reconnect_faehig(&self) -> bool {
        matches!(self, Self::PingZeitlimit | Self::Unbekannt(_))
    }
}

// ---------------------------------------------------------------------------
// Beitritt
// ---------------------------------------------------------------------------

/// Verarbeitet eine Beitrittsanfrage
///
/// Fehlende Pflichtfelder beantwortet der Socket mit `connectionError`,
/// ohne dass Session-Zustand entsteht.
pub async fn beitreten<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    anfrage: BeitrittsAnfrage,
) {
    let (session_id, client_id) = match (anfrage.session_id, anfrage.client_id) {
        (Some(session_id), Some(client_id)) => (session_id, client_id),
        _ => {
            tracing::warn!(socket_id = %socket, "Beitritt ohne sessionId oder clientId");
            state.broadcaster.an_socket_senden(
                &socket,
                ServerEvent::fehler("sessionId oder clientId fehlt"),
            );
            return;
        }
    };

    beitreten_intern(state, socket, session_id, client_id, VerbindungsEvent::Verbunden).await;
}

/// Fuehrt den Beitritt eines validierten (Session, Client, Socket)-Tripels aus
///
/// Legt die Session bei Bedarf an, verdraengt alle anderen Sockets des
/// Clients, pflegt Roster und Zuordnung und meldet `joined` an den Raum.
/// Gibt `false` zurueck wenn der Raum-Beitritt scheitert; dann bleibt die
/// Session unangetastet.
pub(crate) async fn beitreten_intern<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    session_id: SessionId,
    client_id: ClientId,
    audit_event: VerbindungsEvent,
) -> bool {
    state.registry.anlegen_wenn_fehlt(session_id);

    // Erst der Raum: scheitert der Transport-Beitritt, wird kein
    // Session-Zustand angelegt.
    if let Err(e) = state.broadcaster.raum_beitreten(socket, session_id) {
        tracing::error!(
            session_id = %session_id,
            client_id = %client_id,
            fehler = %e,
            "Raum-Beitritt fehlgeschlagen"
        );
        // Eine soeben leer angelegte Session darf nicht zurueckbleiben
        state.registry.entfernen_wenn_leer(&session_id);
        return false;
    }

    // Verdraengung und Roster-Pflege in einem kurzen Kritikalabschnitt
    let verdraengte = match state.registry.mit_session_mut(&session_id, |session| {
        let verdraengte: Vec<SocketId> = session
            .sockets_von_client(client_id)
            .into_iter()
            .filter(|alt| *alt != socket)
            .collect();
        for alt in &verdraengte {
            session.sockets.remove(alt);
            session.roster_eintrag_entfernen(client_id);
        }
        session.roster.push(client_id);
        session.roster_deduplizieren();
        session.sockets.insert(socket, client_id);
        verdraengte
    }) {
        Some(verdraengte) => verdraengte,
        None => {
            state.broadcaster.raum_verlassen(&socket);
            tracing::warn!(session_id = %session_id, "Session waehrend des Beitritts entfernt");
            return false;
        }
    };

    for alt in verdraengte {
        state.broadcaster.raum_verlassen(&alt);
        tracing::info!(
            session_id = %session_id,
            client_id = %client_id,
            socket_id = %alt,
            "Alte Verbindung wird verdraengt"
        );

        let broadcaster = state.broadcaster.clone();
        let karenz = Duration::from_millis(state.config.bump_karenz_ms);
        tokio::spawn(async move {
            tokio::time::sleep(karenz).await;
            broadcaster.client_entfernen(&alt);
            tracing::debug!(socket_id = %alt, "Verdraengte Verbindung nach Karenz getrennt");
        });
    }

    state.broadcaster.an_raum_senden(
        &session_id,
        ServerEvent::Joined(SessionMitglied {
            session_id,
            client_id,
        }),
    );

    if let Err(e) = state
        .audit
        .verbindung_protokollieren(jetzt_ms(), session_id, client_id, audit_event)
        .await
    {
        tracing::error!(
            session_id = %session_id,
            client_id = %client_id,
            fehler = %e,
            "Audit-Eintrag fuer Verbindung fehlgeschlagen"
        );
    }

    tracing::info!(
        session_id = %session_id,
        client_id = %client_id,
        socket_id = %socket,
        "Client beigetreten"
    );
    true
}

// ---------------------------------------------------------------------------
// Trennung
// ---------------------------------------------------------------------------

/// Verarbeitet die Trennung eines Sockets
///
/// Reconnect-faehige Gruende versuchen den Wiederbeitritt desselben
/// Tripels; erst wenn der scheitert, wird die Zuordnung abgebaut. Bei
/// allen anderen Gruenden wird der Raum benachrichtigt und die
/// Mitgliedschaft entfernt.
pub async fn trennen<A: AuditLog>(state: &RelayState<A>, socket: SocketId, grund: TrennGrund) {
    let (session_id, client_id) = match state.registry.session_fuer_socket(&socket) {
        Some(zuordnung) => zuordnung,
        None => {
            // Normales Ende einer verdraengten oder nie beigetretenen Verbindung
            tracing::debug!(
                socket_id = %socket,
                grund = grund.als_str(),
                "Trennung ohne Session-Zuordnung"
            );
            return;
        }
    };

    if grund.ist_reconnect_faehig() {
        if let TrennGrund::Unbekannt(roh) = &grund {
            tracing::warn!(socket_id = %socket, grund = %roh, "Unbekannter Trenngrund");
        }
        tracing::info!(
            session_id = %session_id,
            client_id = %client_id,
            grund = grund.als_str(),
            "Reconnect-Versuch"
        );

        if beitreten_intern(
            state,
            socket,
            session_id,
            client_id,
            VerbindungsEvent::Wiederverbunden,
        )
        .await
        {
            tracing::info!(session_id = %session_id, client_id = %client_id, "Client wiederverbunden");
            return;
        }

        // Fehlgeschlagener Reconnect: Zuordnung abbauen, Raum nicht benachrichtigen
        socket_abmelden(state, socket, session_id, client_id, false).await;
        return;
    }

    socket_abmelden(state, socket, session_id, client_id, true).await;
}

/// Baut die Mitgliedschaft eines Sockets ab
async fn socket_abmelden<A: AuditLog>(
    state: &RelayState<A>,
    socket: SocketId,
    session_id: SessionId,
    client_id: ClientId,
    benachrichtigen: bool,
) {
    if benachrichtigen {
        state.broadcaster.an_raum_ausser_senden(
            &session_id,
            &socket,
            ServerEvent::Disconnected(SessionMitglied {
                session_id,
                client_id,
            }),
        );
    }

    state.registry.mit_session_mut(&session_id, |session| {
        session.sockets.remove(&socket);
        session.roster_eintrag_entfernen(client_id);
    });
    state.broadcaster.raum_verlassen(&socket);

    if let Err(e) = state
        .audit
        .verbindung_protokollieren(jetzt_ms(), session_id, client_id, VerbindungsEvent::Getrennt)
        .await
    {
        tracing::error!(
            session_id = %session_id,
            client_id = %client_id,
            fehler = %e,
            "Audit-Eintrag fuer Trennung fehlgeschlagen"
        );
    }

    tracing::info!(session_id = %session_id, client_id = %client_id, "Client getrennt");

    session_aufraeumen(state, session_id).await;
}

/// Entfernt eine leer gewordene Session und schliesst ihre Aufzeichnung ab
async fn session_aufraeumen<A: AuditLog>(state: &RelayState<A>, session_id: SessionId) {
    let Some(mut session) = state.registry.entfernen_wenn_leer(&session_id) else {
        return;
    };
    tracing::info!(session_id = %session_id, "Leere Session entfernt");

    if let Some(abschluss) = session.aufzeichnung.beenden() {
        recording::abschluss_persistieren(state, session_id, abschluss).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

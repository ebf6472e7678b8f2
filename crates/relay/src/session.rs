//! Session-Registry – Verwaltet alle laufenden Sessions
//!
//! Eine Session besitzt ihre Teilnehmerliste, die Socket-Zuordnung, den
//! Entity-Speicher und den Aufzeichnungszustand exklusiv. Die Registry
//! haelt die Sessions in einer DashMap; Zugriffe laufen ueber kurze,
//! geschlossene Kritikalabschnitte (`mit_session`/`mit_session_mut`), die
//! nie ueber einen await-Punkt gehalten werden.

use dashmap::DashMap;
use seance_core::types::{ClientId, SessionId, SocketId};
use seance_core::zeit::jetzt_ms;
use seance_protocol::events::{SessionDetails, ZustandV1, ZustandV2, ZustandsAntwort};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::EntityStore;
use crate::recording::CaptureZustand;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Eine laufende Session mit synchronisiertem Entity-Zustand
///
/// Die Teilnehmerliste darf waehrend eines Reconnects kurzzeitig Duplikate
/// enthalten; ausserhalb dieses Fensters entspricht jeder Eintrag genau
/// einer lebenden Socket-Zuordnung.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Socket -> Client Zuordnung (ein Eintrag pro lebender Verbindung)
    pub sockets: HashMap<SocketId, ClientId>,
    /// Geordnete Teilnehmerliste
    pub roster: Vec<ClientId>,
    pub entities: EntityStore,
    /// Aktive Szene (von SCENE_CHANGE-Interaktionen gesetzt)
    pub scene: Option<i64>,
    /// Unix-Millisekunden der Session-Erstellung
    pub session_start: i64,
    pub aufzeichnung: CaptureZustand,
}

impl Session {
    /// Erstellt eine leere Session
    pub fn neu(id: SessionId) -> Self {
        Self {
            id,
            sockets: HashMap::new(),
            roster: Vec::new(),
            entities: EntityStore::neu(),
            scene: None,
            session_start: jetzt_ms(),
            aufzeichnung: CaptureZustand::neu(),
        }
    }

    /// Prueft ob ein Client in der Teilnehmerliste steht
    pub fn ist_mitglied(&self, client_id: ClientId) -> bool {
        self.roster.contains(&client_id)
    }

    /// Entfernt Duplikate aus der Teilnehmerliste (erstes Vorkommen bleibt)
    pub fn roster_deduplizieren(&mut self) {
        let mut gesehen = HashSet::new();
        self.roster.retain(|client| gesehen.insert(*client));
    }

    /// Entfernt ein einzelnes Vorkommen eines Clients aus der Teilnehmerliste
    pub fn roster_eintrag_entfernen(&mut self, client_id: ClientId) {
        if let Some(pos) = self.roster.iter().position(|c| *c == client_id) {
            self.roster.remove(pos);
        }
    }

    /// Alle Sockets die aktuell auf einen Client zeigen
    pub fn sockets_von_client(&self, client_id: ClientId) -> Vec<SocketId> {
        self.sockets
            .iter()
            .filter(|(_, c)| **c == client_id)
            .map(|(socket, _)| *socket)
            .collect()
    }

    /// Baut den Zustands-Snapshot der angefragten Version
    ///
    /// Nur Version 2 liefert volle Entity-Records; alle anderen Werte
    /// (auch fehlende oder unbekannte) fallen auf die Version-1-Form zurueck.
    pub fn snapshot(&self, version: Option<i64>) -> ZustandsAntwort {
        match version {
            Some(2) => ZustandsAntwort::V2(ZustandV2 {
                clients: self.roster.clone(),
                entities: self.entities.alle().to_vec(),
                scene: self.scene,
                is_recording: self.aufzeichnung.aktiv,
            }),
            _ => ZustandsAntwort::V1(ZustandV1 {
                clients: self.roster.clone(),
                entities: self.entities.ids(),
                locked: self.entities.gesperrte_ids(),
                scene: self.scene,
                is_recording: self.aufzeichnung.aktiv,
            }),
        }
    }

    /// Baut die Session-Uebersicht fuer `sessionInfo`
    pub fn details(&self) -> SessionDetails {
        SessionDetails {
            id: self.id,
            clients: self.roster.clone(),
            entities: self.entities.alle().to_vec(),
            scene: self.scene,
            is_recording: self.aufzeichnung.aktiv,
            session_start: self.session_start,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Registry aller laufenden Sessions
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Legt die Session an falls sie noch nicht existiert
    pub fn anlegen_wenn_fehlt(&self, id: SessionId) {
        self.sessions.entry(id).or_insert_with(|| {
            tracing::info!(session_id = %id, "Session angelegt");
            Session::neu(id)
        });
    }

    /// Prueft ob eine Session existiert
    pub fn existiert(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Fuehrt eine Leseoperation unter dem Registry-Guard aus
    ///
    /// Gibt `None` zurueck wenn die Session fehlt. Die Closure darf kein
    /// await enthalten; der Guard lebt nur fuer ihre Dauer.
    pub fn mit_session<R>(&self, id: &SessionId, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.sessions.get(id).map(|session| f(&session))
    }

    /// Fuehrt eine Schreiboperation unter dem Registry-Guard aus
    pub fn mit_session_mut<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(id).map(|mut session| f(&mut session))
    }

    /// Sucht Session und Client fuer einen Socket
    pub fn session_fuer_socket(&self, socket: &SocketId) -> Option<(SessionId, ClientId)> {
        self.sessions.iter().find_map(|eintrag| {
            eintrag
                .value()
                .sockets
                .get(socket)
                .map(|client| (eintrag.value().id, *client))
        })
    }

    /// Entfernt eine Session nur wenn ihre Teilnehmerliste leer ist
    ///
    /// Gibt die entfernte Session zurueck, damit der Aufrufer eine noch
    /// laufende Aufzeichnung abschliessen kann.
    pub fn entfernen_wenn_leer(&self, id: &SessionId) -> Option<Session> {
        self.sessions
            .remove_if(id, |_, session| session.roster.is_empty())
            .map(|(_, session)| session)
    }

    /// Anzahl der laufenden Sessions
    pub fn anzahl(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

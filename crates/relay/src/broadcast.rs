//! Raum-Broadcaster – Sendet Events an alle relevanten Sockets
//!
//! Der RoomBroadcaster verwaltet die Send-Queues aller verbundenen Sockets
//! und die Raum-Mitgliedschaft (ein Raum pro Session). Er stellt Methoden
//! bereit, um Events gezielt, an einen Raum oder an alle ausser einen
//! Socket zu senden.
//!
//! Senden ist nicht-blockierend: eine volle oder geschlossene Queue fuehrt
//! zum Verwerfen des Events, nie zum Blockieren des Aufrufers.

use dashmap::DashMap;
use seance_core::types::{SessionId, SocketId};
use seance_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Socket
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Sockets
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub socket_id: SocketId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Sendet ein Event nicht-blockierend an den Socket
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(socket_id = %self.socket_id, "Send-Queue voll – Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(socket_id = %self.socket_id, "Send-Queue geschlossen (Socket getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RoomBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle verbundenen Sockets
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomBroadcaster {
    inner: Arc<RoomBroadcasterInner>,
}

struct RoomBroadcasterInner {
    /// Socket-Sender, indiziert nach SocketId
    clients: DashMap<SocketId, ClientSender>,
    /// Raum-Mitgliedschaft: session_id -> Vec<SocketId>
    raum_mitglieder: DashMap<SessionId, Vec<SocketId>>,
}

impl RoomBroadcaster {
    /// Erstellt einen neuen RoomBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RoomBroadcasterInner {
                clients: DashMap::new(),
                raum_mitglieder: DashMap::new(),
            }),
        }
    }

    /// Registriert einen neuen Socket und gibt seine Empfangs-Queue zurueck
    ///
    /// Die Verbindungsschleife liest aus dieser Queue und sendet via TCP.
    /// Wird der Sender entfernt (`client_entfernen`), liefert die Queue
    /// `None` und die Verbindung beendet sich.
    pub fn client_registrieren(&self, socket_id: SocketId) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender { socket_id, tx };
        self.inner.clients.insert(socket_id, sender);
        tracing::debug!(socket_id = %socket_id, "Socket im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Socket aus dem Broadcaster und allen Raeumen
    pub fn client_entfernen(&self, socket_id: &SocketId) {
        self.inner.clients.remove(socket_id);
        self.inner.raum_mitglieder.iter_mut().for_each(|mut eintrag| {
            eintrag.value_mut().retain(|s| s != socket_id);
        });
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
        tracing::debug!(socket_id = %socket_id, "Socket aus Broadcaster entfernt");
    }

    /// Fuegt einen Socket dem Raum einer Session hinzu
    ///
    /// Ein Socket ist in hoechstens einem Raum; ein frueherer Raum wird
    /// verlassen. Schlaegt fehl wenn der Socket nicht registriert ist –
    /// in dem Fall darf der Aufrufer keinen Session-Zustand anlegen.
    pub fn raum_beitreten(&self, socket_id: SocketId, session_id: SessionId) -> RelayResult<()> {
        if !self.inner.clients.contains_key(&socket_id) {
            return Err(RelayError::RaumBeitritt(format!(
                "Socket {socket_id} ist nicht registriert"
            )));
        }

        self.inner.raum_mitglieder.iter_mut().for_each(|mut eintrag| {
            eintrag.value_mut().retain(|s| s != &socket_id);
        });

        self.inner
            .raum_mitglieder
            .entry(session_id)
            .or_default()
            .push(socket_id);
        Ok(())
    }

    /// Entfernt einen Socket aus seinem Raum
    pub fn raum_verlassen(&self, socket_id: &SocketId) {
        self.inner.raum_mitglieder.iter_mut().for_each(|mut eintrag| {
            eintrag.value_mut().retain(|s| s != socket_id);
        });
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
    }

    /// Sendet ein Event an einen einzelnen Socket
    ///
    /// Gibt `true` zurueck wenn der Socket gefunden und das Event
    /// eingereiht wurde.
    pub fn an_socket_senden(&self, socket_id: &SocketId, event: ServerEvent) -> bool {
        match self.inner.clients.get(socket_id) {
            Some(sender) => sender.senden(event),
            None => {
                tracing::debug!(socket_id = %socket_id, "Senden an unbekannten Socket");
                false
            }
        }
    }

    /// Sendet ein Event an alle Sockets in einem Raum
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_raum_senden(&self, session_id: &SessionId, event: ServerEvent) -> usize {
        let sockets = match self.inner.raum_mitglieder.get(session_id) {
            Some(sockets) => sockets.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for socket_id in &sockets {
            if let Some(sender) = self.inner.clients.get(socket_id) {
                if sender.senden(event.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet ein Event an alle Sockets in einem Raum ausser einem
    ///
    /// Der Normalfall beim Weiterleiten: der Absender bekommt sein eigenes
    /// Event nicht zurueck.
    pub fn an_raum_ausser_senden(
        &self,
        session_id: &SessionId,
        ausgeschlossen: &SocketId,
        event: ServerEvent,
    ) -> usize {
        let sockets = match self.inner.raum_mitglieder.get(session_id) {
            Some(sockets) => sockets.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for socket_id in &sockets {
            if socket_id == ausgeschlossen {
                continue;
            }
            if let Some(sender) = self.inner.clients.get(socket_id) {
                if sender.senden(event.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Gibt die Anzahl der registrierten Sockets zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob ein Socket registriert ist
    pub fn ist_registriert(&self, socket_id: &SocketId) -> bool {
        self.inner.clients.contains_key(socket_id)
    }

    /// Gibt alle Sockets in einem Raum zurueck
    pub fn sockets_im_raum(&self, session_id: &SessionId) -> Vec<SocketId> {
        self.inner
            .raum_mitglieder
            .get(session_id)
            .map(|sockets| sockets.clone())
            .unwrap_or_default()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

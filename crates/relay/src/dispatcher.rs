//! Event-Dispatcher – Ordnet Client-Events den Relay-Pfaden zu

use seance_core::types::SocketId;
use seance_db::AuditLog;
use seance_protocol::ClientEvent;
use std::sync::Arc;

use crate::state::RelayState;
use crate::{lifecycle, playback, recording, router};

/// Verteilt eingehende Client-Events auf die Relay-Pfade
pub struct RelayDispatcher<A: AuditLog + 'static> {
    state: Arc<RelayState<A>>,
}

impl<A: AuditLog + 'static> RelayDispatcher<A> {
    pub fn neu(state: Arc<RelayState<A>>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein einzelnes Client-Event
    pub async fn dispatch(&self, socket: SocketId, event: ClientEvent) {
        match event {
            ClientEvent::Join(anfrage) => {
                lifecycle::beitreten(&self.state, socket, anfrage).await;
            }
            ClientEvent::State(anfrage) => {
                router::zustand_senden(&self.state, socket, anfrage);
            }
            ClientEvent::Draw(liste) => {
                router::draw_weiterleiten(&self.state, socket, liste);
            }
            ClientEvent::Message(umschlag) => {
                router::nachricht_verarbeiten(&self.state, socket, umschlag);
            }
            ClientEvent::Update(liste) => {
                router::update_verarbeiten(&self.state, socket, liste).await;
            }
            ClientEvent::Interact(liste) => {
                router::interaktion_verarbeiten(&self.state, socket, liste).await;
            }
            ClientEvent::StartRecording(session_id) => {
                recording::aufzeichnung_starten(&self.state, session_id).await;
            }
            ClientEvent::EndRecording(session_id) => {
                recording::aufzeichnung_beenden(&self.state, session_id).await;
            }
            ClientEvent::Playback(anfrage) => {
                playback::wiedergabe_starten(&self.state, socket, anfrage).await;
            }
            ClientEvent::SessionInfo(session_id) => {
                router::session_info_senden(&self.state, socket, session_id);
            }
            ClientEvent::Disconnect => {
                // Wird von der Verbindungsschleife behandelt
                tracing::debug!(socket_id = %socket, "disconnect-Event im Dispatcher");
            }
        }
    }
}

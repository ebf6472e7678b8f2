//! Integrationstests des Relays
//!
//! Die Tests treiben die Relay-Pfade direkt ueber den Zustand, ohne
//! TCP-Transport: registrierte Test-Sockets empfangen Server-Events
//! ueber ihre Send-Queues.

mod router_tests;

use seance_core::types::{ClientId, EntityId, SessionId, SocketId};
use seance_db::NullAuditLog;
use seance_protocol::events::{BeitrittsAnfrage, Entity, RelayEnvelope};
use seance_protocol::ServerEvent;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::lifecycle;
use crate::state::{RelayConfig, RelayState};
use crate::storage::CaptureStorage;

/// Baut einen Relay-Zustand mit Wegwerf-Ablage
fn test_state() -> (Arc<RelayState<NullAuditLog>>, tempfile::TempDir) {
    let verzeichnis = tempfile::tempdir().unwrap();
    let storage = CaptureStorage::neu(verzeichnis.path());
    let state = RelayState::neu(RelayConfig::default(), storage, NullAuditLog);
    (state, verzeichnis)
}

/// Registriert einen Socket und laesst ihn der Session beitreten
async fn mitglied_anmelden(
    state: &Arc<RelayState<NullAuditLog>>,
    session: i64,
    client: i64,
) -> (SocketId, mpsc::Receiver<ServerEvent>) {
    let socket = SocketId::new();
    let rx = state.broadcaster.client_registrieren(socket);
    lifecycle::beitreten(
        state,
        socket,
        BeitrittsAnfrage {
            session_id: Some(SessionId(session)),
            client_id: Some(ClientId(client)),
        },
    )
    .await;
    (socket, rx)
}

/// Baut einen Relay-Umschlag mit Interaktions-Payload
fn interaktions_umschlag(session: i64, client: i64, ziel: i64, typ: i64) -> RelayEnvelope {
    RelayEnvelope {
        session_id: Some(SessionId(session)),
        client_id: Some(ClientId(client)),
        typ: Some("interaction".into()),
        message: Some(json!([0, session, client, client, ziel, typ])),
        ts: None,
        seq: None,
        capture_id: None,
    }
}

/// Liest eine Entity aus dem Session-Zustand
fn entity_holen(state: &Arc<RelayState<NullAuditLog>>, session: i64, id: i64) -> Option<Entity> {
    state
        .registry
        .mit_session(&SessionId(session), |s| {
            s.entities.holen(EntityId(id)).cloned()
        })
        .flatten()
}

/// Leert eine Queue und gibt alle anstehenden Events zurueck
fn alle_events(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

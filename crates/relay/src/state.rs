//! Gemeinsamer Relay-Zustand
//!
//! Haelt Registry, Broadcaster, Capture-Ablage und die Audit-Senke als ein
//! Arc-geteiltes Serviceobjekt, das beim Start erzeugt und an die
//! Transportschicht gereicht wird. Keine globalen Variablen.

use seance_db::AuditLog;
use std::sync::Arc;

use crate::broadcast::RoomBroadcaster;
use crate::session::SessionRegistry;
use crate::storage::CaptureStorage;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Karenzzeit in Millisekunden bevor eine verdraengte Verbindung
    /// endgueltig getrennt wird
    pub bump_karenz_ms: u64,
    /// Pruefintervall fuer inaktive Verbindungen in Sekunden
    pub keepalive_sek: u64,
    /// Inaktivitaets-Zeitlimit in Sekunden (Ping-Timeout)
    pub zeitlimit_sek: u64,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bump_karenz_ms: 500,
            keepalive_sek: 25,
            zeitlimit_sek: 60,
            max_clients: 512,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState<A: AuditLog> {
    /// Relay-Konfiguration
    pub config: RelayConfig,
    /// Session-Registry (Sessions, Roster, Entities, Aufzeichnung)
    pub registry: SessionRegistry,
    /// Raum-Broadcaster (Events an Sockets senden)
    pub broadcaster: RoomBroadcaster,
    /// Capture-Ablage auf der Festplatte
    pub storage: CaptureStorage,
    /// Audit-Senke fuer Verbindungs- und Capture-Ereignisse
    pub audit: A,
}

impl<A: AuditLog> RelayState<A> {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, storage: CaptureStorage, audit: A) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::neu(),
            broadcaster: RoomBroadcaster::neu(),
            storage,
            audit,
        })
    }
}

//! seance-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Audit-Protokoll und Relay zu einem
//! lauffaehigen Server.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use seance_db::{AuditLog, NullAuditLog, SqliteDb};
use seance_relay::{CaptureStorage, RelayServer, RelayState};
use std::net::SocketAddr;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Shutdown-Kanal und Ctrl-C-Task aufsetzen
    /// 2. Audit-Protokoll waehlen (SQLite oder Null-Implementierung)
    /// 3. Aufzeichnungs-Ablage anlegen
    /// 4. TCP-Listener des Relays starten
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar"),
            }
        });

        if self.config.datenbank.aktiviert {
            // oeffnen() fuehrt die Migrationen bereits aus
            let db = SqliteDb::oeffnen(&self.config.db_config())
                .await
                .context("Audit-Datenbank nicht erreichbar")?;
            tracing::info!(url = %self.config.datenbank.url, "Audit-Datenbank verbunden");
            self.laufen(db, shutdown_rx).await
        } else {
            tracing::info!("Audit-Protokoll deaktiviert");
            self.laufen(NullAuditLog, shutdown_rx).await
        }
    }

    async fn laufen<A: AuditLog + 'static>(
        self,
        audit: A,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.aufzeichnung.pfad)
            .await
            .with_context(|| {
                format!(
                    "Aufzeichnungs-Ablage '{}' nicht anlegbar",
                    self.config.aufzeichnung.pfad
                )
            })?;

        let storage = CaptureStorage::neu(&self.config.aufzeichnung.pfad);
        let state = RelayState::neu(self.config.relay_config(), storage, audit);

        let adresse: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Bind-Adresse '{}' ungueltig", self.config.tcp_bind_adresse()))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            max_clients = self.config.server.max_clients,
            aufzeichnung = %self.config.aufzeichnung.pfad,
            "Relay startet"
        );

        let server = RelayServer::neu(state, adresse);
        server.starten(shutdown_rx).await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

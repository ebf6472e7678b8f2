//! TCP-Server – Nimmt Verbindungen an und startet die Frame-Schleifen

use seance_db::AuditLog;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::LocalSet;

use crate::connection::ClientConnection;
use crate::error::RelayResult;
use crate::state::RelayState;

/// TCP-Endpunkt des Relays
pub struct RelayServer<A: AuditLog + 'static> {
    state: Arc<RelayState<A>>,
    bind_addr: SocketAddr,
}

impl<A: AuditLog + 'static> RelayServer<A> {
    pub fn neu(state: Arc<RelayState<A>>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Faehrt den Server hoch und laeuft bis zum Shutdown-Signal
    ///
    /// Die Verbindungs-Futures sind nicht Send; die Annahme-Schleife
    /// laeuft deshalb auf einem LocalSet und startet sie per spawn_local.
    pub async fn starten(&self, shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let lokal = LocalSet::new();
        lokal.run_until(self.annehmen(shutdown_rx)).await
    }

    async fn annehmen(&self, mut shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(adresse = %self.bind_addr, "Relay-Server gestartet");

        loop {
            tokio::select! {
                eingehend = listener.accept() => match eingehend {
                    Ok((stream, adresse)) => {
                        let max = self.state.config.max_clients as usize;
                        if self.state.broadcaster.client_anzahl() >= max {
                            tracing::warn!(%adresse, max_clients = max, "Verbindung abgewiesen: Limit erreicht");
                            drop(stream);
                            continue;
                        }

                        let verbindung = ClientConnection::neu(Arc::clone(&self.state), adresse);
                        let shutdown = shutdown_rx.clone();
                        tokio::task::spawn_local(async move {
                            verbindung.verarbeiten(stream, shutdown).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "Annahme fehlgeschlagen");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server faehrt herunter");
                        return Ok(());
                    }
                }
            }
        }
    }
}

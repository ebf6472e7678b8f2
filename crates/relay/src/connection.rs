//! Client-Verbindung – Frame-Schleife eines einzelnen TCP-Sockets
//!
//! Die Schleife treibt vier Quellen: eingehende Frames, die Send-Queue
//! des Broadcasters, den Keepalive-Takt und das Shutdown-Signal. Sie
//! endet mit einem Trenngrund, der an den Lebenszyklus uebergeben wird;
//! erst danach wird der Socket aus dem Broadcaster entfernt, damit ein
//! Reconnect-Versuch den registrierten Socket noch vorfindet.

use futures_util::{SinkExt, StreamExt};
use seance_core::types::SocketId;
use seance_db::AuditLog;
use seance_protocol::{ClientEvent, FrameCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::dispatcher::RelayDispatcher;
use crate::lifecycle::{self, TrennGrund};
use crate::state::RelayState;

/// Zustand einer einzelnen Client-Verbindung
pub struct ClientConnection<A: AuditLog + 'static> {
    state: Arc<RelayState<A>>,
    peer_addr: SocketAddr,
    socket_id: SocketId,
}

impl<A: AuditLog + 'static> ClientConnection<A> {
    pub fn neu(state: Arc<RelayState<A>>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            socket_id: SocketId::new(),
        }
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket_id
    }

    /// Treibt die Verbindung bis zur Trennung
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let mut sende_rx = self.state.broadcaster.client_registrieren(self.socket_id);
        let mut framed = Framed::new(stream, FrameCodec::new());
        let dispatcher = RelayDispatcher::neu(Arc::clone(&self.state));

        let zeitlimit = Duration::from_secs(self.state.config.zeitlimit_sek);
        let mut pruef_takt =
            tokio::time::interval(Duration::from_secs(self.state.config.keepalive_sek));
        let mut letzter_empfang = Instant::now();

        tracing::info!(
            socket_id = %self.socket_id,
            adresse = %self.peer_addr,
            "Verbindung angenommen"
        );

        let grund = loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(wert)) => {
                        letzter_empfang = Instant::now();
                        let event: ClientEvent = match serde_json::from_value(wert) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::warn!(socket_id = %self.socket_id, fehler = %e, "Unverstandenes Event verworfen");
                                continue;
                            }
                        };
                        if matches!(event, ClientEvent::Disconnect) {
                            break TrennGrund::ClientTrennung;
                        }
                        dispatcher.dispatch(self.socket_id, event).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(socket_id = %self.socket_id, fehler = %e, "Transportfehler");
                        break TrennGrund::TransportFehler;
                    }
                    None => {
                        tracing::info!(socket_id = %self.socket_id, "Transport geschlossen");
                        break TrennGrund::TransportGeschlossen;
                    }
                },
                ausgehend = sende_rx.recv() => match ausgehend {
                    Some(event) => {
                        if let Err(e) = framed.send(event).await {
                            tracing::warn!(socket_id = %self.socket_id, fehler = %e, "Senden fehlgeschlagen");
                            break TrennGrund::TransportFehler;
                        }
                    }
                    // Queue geschlossen: der Broadcaster hat den Socket entfernt
                    None => break TrennGrund::ServerTrennung,
                },
                _ = pruef_takt.tick() => {
                    if letzter_empfang.elapsed() > zeitlimit {
                        tracing::warn!(socket_id = %self.socket_id, "Keepalive abgelaufen");
                        break TrennGrund::PingZeitlimit;
                    }
                }
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(socket_id = %self.socket_id, "Verbindung wird heruntergefahren");
                        break TrennGrund::ServerTrennung;
                    }
                }
            }
        };

        // Erst der Lebenszyklus: bei reconnect-faehigen Gruenden muss der
        // Socket dafuer noch im Broadcaster registriert sein.
        lifecycle::trennen(&self.state, self.socket_id, grund).await;
        self.state.broadcaster.client_entfernen(&self.socket_id);

        tracing::info!(
            socket_id = %self.socket_id,
            adresse = %self.peer_addr,
            "Verbindung beendet"
        );
    }
}

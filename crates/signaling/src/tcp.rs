//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` startet fuer jede eingehende Verbindung einen
//! eigenen tokio-Task mit einer `ClientConnection`. Die Repository-Traits
//! liefern `Send`-Futures, daher laufen die Tasks auf dem
//! Multi-Thread-Runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::server_state::{ServerRepository, SignalingState};

/// TCP-Server fuer Plauder-Clients
pub struct SignalingServer<R: ServerRepository> {
    state: Arc<SignalingState<R>>,
    bind_addr: SocketAddr,
}

impl<R: ServerRepository> SignalingServer<R> {
    pub fn neu(state: Arc<SignalingState<R>>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Bindet den Socket und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener(listener, shutdown_rx).await
    }

    /// Wie `starten`, aber mit bereits gebundenem Listener (z.B. Port 0 in Tests)
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "TCP-Server gestartet");

        loop {
            tokio::select! {
                ergebnis = listener.accept() => {
                    match ergebnis {
                        Ok((stream, peer_addr)) => {
                            let verbunden = self.state.presence.verbindungen() as u32;
                            if verbunden >= self.state.config.max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
                            let shutdown = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("TCP-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP-Server gestoppt");
        Ok(())
    }
}

//! plauder-server – Bibliotheks-Root
//!
//! Verdrahtet Datenbank, Authentifizierung, Metriken und den
//! TCP-Verbindungsdienst und stellt den Einstiegspunkt fuer `main` bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use plauder_auth::{AuthService, PasswordHasher, TokenService};
use plauder_db::{DatabaseConfig, MessageRepository, SqliteDb};
use plauder_observability::{observability_server_starten, HealthState, PlauderMetrics};
use plauder_signaling::{SignalingConfig, SignalingServer, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Intervall der Bereinigung alter Nachrichten
pub const BEREINIGUNGS_INTERVALL: Duration = Duration::from_secs(60 * 60);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler nicht installierbar"),
            }
            let _ = shutdown_tx.send(true);
        });
        self.laufen(shutdown_rx).await
    }

    /// Startet alle Subsysteme und laeuft bis `shutdown_rx` gesetzt wird
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen (Migrationen)
    /// 2. Token-Schluessel und Passwort-Hashing
    /// 3. Metriken und optional `/metrics` + `/health`
    /// 4. Bereinigung alter Nachrichten (falls Aufbewahrung begrenzt)
    /// 5. TCP-Listener
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let config = self.config;
        let tcp_adresse: SocketAddr = config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige TCP-Bind-Adresse")?;

        tracing::info!(
            tcp = %tcp_adresse,
            url = %config.datenbank.url,
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&DatabaseConfig {
                url: config.datenbank.url.clone(),
                max_verbindungen: config.datenbank.max_verbindungen,
                sqlite_wal: config.datenbank.wal,
            })
            .await
            .context("Datenbank nicht verfuegbar")?,
        );

        if config.standard_schluessel() {
            tracing::warn!(
                "Eingebauter Token-Schluessel aktiv; fuer den Betrieb SECRET_KEY setzen"
            );
        }
        let tokens = TokenService::aus_hex(&config.sicherheit.secret_key)
            .context("secret_key ungueltig")?;
        let auth = Arc::new(AuthService::neu(
            Arc::clone(&db),
            tokens,
            PasswordHasher::mit_kosten(config.sicherheit.bcrypt_kosten),
        ));

        let metriken = PlauderMetrics::neu()?;
        let health = HealthState::neu().mit_verbindungen(metriken.connected_clients.clone());

        if let Some(adresse) = config.observability_bind_adresse() {
            let adresse: SocketAddr = adresse
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let metriken = metriken.clone();
            let health = health.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, metriken, health).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        if let Some(aufbewahrung) = config.aufbewahrung() {
            tokio::spawn(bereinigung_laufen(
                Arc::clone(&db),
                aufbewahrung,
                health.clone(),
                shutdown_rx.clone(),
            ));
        }

        let signaling_config = SignalingConfig {
            max_clients: config.netzwerk.max_clients,
            poll_intervall: config.poll_intervall(),
            max_frame_groesse: config.netzwerk.max_frame_groesse,
            ..SignalingConfig::default()
        };
        let state = SignalingState::neu(signaling_config, auth, db, Some(metriken));

        SignalingServer::neu(state, tcp_adresse)
            .starten(shutdown_rx)
            .await
            .context("TCP-Server fehlgeschlagen")?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bereinigung
// ---------------------------------------------------------------------------

/// Loescht nicht zugestellte Nachrichten, die aelter als `aufbewahrung` sind
pub async fn alte_nachrichten_loeschen<R: MessageRepository>(
    db: &R,
    aufbewahrung: chrono::Duration,
) -> plauder_db::DbResult<u64> {
    let grenze = chrono::Utc::now() - aufbewahrung;
    db.purge_messages_older_than(grenze).await
}

async fn bereinigung_laufen<R: MessageRepository>(
    db: Arc<R>,
    aufbewahrung: chrono::Duration,
    health: HealthState,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut takt = tokio::time::interval(BEREINIGUNGS_INTERVALL);
    loop {
        tokio::select! {
            _ = takt.tick() => {
                match alte_nachrichten_loeschen(&*db, aufbewahrung).await {
                    Ok(0) => {}
                    Ok(anzahl) => tracing::info!(anzahl, "Alte Nachrichten geloescht"),
                    Err(e) => {
                        health.db_status_setzen(false);
                        tracing::warn!(fehler = %e, "Bereinigung fehlgeschlagen");
                        continue;
                    }
                }
                health.db_status_setzen(true);
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plauder_db::QueuedMessage;

    fn nachricht(id: i64, alter_tage: i64) -> QueuedMessage {
        QueuedMessage {
            id,
            kind: 0,
            from: "alice".into(),
            to: "bob".into(),
            data: b"x".to_vec(),
            created_at: Utc::now() - chrono::Duration::days(alter_tage),
        }
    }

    #[tokio::test]
    async fn bereinigung_loescht_nur_alte_nachrichten() {
        let db = SqliteDb::in_memory().await.unwrap();
        db.new_message(&nachricht(1, 10)).await.unwrap();
        db.new_message(&nachricht(2, 1)).await.unwrap();

        let geloescht = alte_nachrichten_loeschen(&db, chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(geloescht, 1);

        let rest = db.pop_messages_for("bob").await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, 2);
    }

    #[tokio::test]
    async fn server_startet_und_stoppt() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.tcp_port = 0;
        config.datenbank.url = format!("sqlite://{}", dir.path().join("test.db").display());
        config.sicherheit.bcrypt_kosten = 4;
        config.nachrichten.aufbewahrung_tage = 1;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(Server::neu(config).laufen(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("Server muss auf Shutdown reagieren")
            .unwrap()
            .unwrap();
    }
}

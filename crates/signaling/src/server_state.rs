//! Gemeinsamer Server-Zustand fuer den Verbindungsdienst
//!
//! Haelt alle geteilten Services und Zustands-Manager, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use plauder_auth::AuthService;
use plauder_core::{SessionIdGenerator, SnowflakeGenerator};
use plauder_db::{AccountRepository, MessageRepository};
use plauder_observability::PlauderMetrics;
use plauder_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::Duration;

use crate::presence::PresenceManager;
use crate::push::{PushBus, PUSH_QUEUE_KAPAZITAET};

/// Repository-Buendel, das der Server benoetigt
pub trait ServerRepository: AccountRepository + MessageRepository + 'static {}

impl<T: AccountRepository + MessageRepository + 'static> ServerRepository for T {}

/// Konfiguration fuer den Verbindungsdienst
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Abfrageintervall der Nachrichten-Warteschlange
    pub poll_intervall: Duration,
    /// Kapazitaet der Push-Queue pro Sitzung
    pub push_queue: usize,
    /// Obergrenze fuer eingehende Frames in Bytes
    pub max_frame_groesse: usize,
    /// Knoten-ID fuer Snowflake-Nachrichten-IDs
    pub knoten_id: u16,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            poll_intervall: Duration::from_millis(100),
            push_queue: PUSH_QUEUE_KAPAZITAET,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            knoten_id: 1,
        }
    }
}

/// Gemeinsamer Server-Zustand (Arc-geteilt)
pub struct SignalingState<R: ServerRepository> {
    pub config: Arc<SignalingConfig>,
    /// Registrierung, Anmeldung, Token
    pub auth_service: Arc<AuthService<R>>,
    /// Konten und Nachrichten-Warteschlange
    pub db: Arc<R>,
    pub presence: PresenceManager,
    pub push: PushBus,
    pub nachrichten_ids: SnowflakeGenerator,
    pub session_ids: SessionIdGenerator,
    pub metriken: Option<PlauderMetrics>,
}

impl<R: ServerRepository> SignalingState<R> {
    /// Erstellt den Zustand und startet den Push-Bus
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden.
    pub fn neu(
        config: SignalingConfig,
        auth_service: Arc<AuthService<R>>,
        db: Arc<R>,
        metriken: Option<PlauderMetrics>,
    ) -> Arc<Self> {
        let push = PushBus::starten_mit(
            metriken.as_ref().map(|m| m.pushes_dropped_total.clone()),
        );
        Arc::new(Self {
            nachrichten_ids: SnowflakeGenerator::neu(config.knoten_id),
            config: Arc::new(config),
            auth_service,
            db,
            presence: PresenceManager::neu(),
            push,
            session_ids: SessionIdGenerator::neu(),
            metriken,
        })
    }

    /// Uebertraegt die Presence-Zaehler in die Gauges
    pub(crate) fn gauges_aktualisieren(&self) {
        if let Some(m) = &self.metriken {
            m.connected_clients.set(self.presence.verbindungen() as i64);
            m.authenticated_sessions
                .set(self.presence.angemeldete_sitzungen() as i64);
        }
    }
}

/// Zustand mit In-Memory-Datenbank und schnellem bcrypt fuer Tests
#[cfg(test)]
pub(crate) async fn test_state() -> Arc<SignalingState<plauder_db::SqliteDb>> {
    use plauder_auth::{PasswordHasher, TokenService};

    let db = Arc::new(
        plauder_db::SqliteDb::in_memory()
            .await
            .expect("In-Memory DB"),
    );
    let auth = Arc::new(AuthService::neu(
        Arc::clone(&db),
        TokenService::neu(&[3u8; 32]),
        PasswordHasher::mit_kosten(4),
    ));
    SignalingState::neu(SignalingConfig::default(), auth, db, None)
}

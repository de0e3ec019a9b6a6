//! Repository-Trait-Definitionen
//!
//! Die Traits entkoppeln Server- und Client-Logik von SQLite. Sie nutzen
//! `async_trait`, damit die Futures `Send` sind und Verbindungs-Tasks per
//! `tokio::spawn` auf dem Multi-Thread-Runtime laufen koennen.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plauder_core::AccountId;

use crate::error::DbError;
use crate::models::{
    schluessel, AccountRecord, LocalMessage, NeuesKonto, PraesenzHinweis, QueuedMessage,
    UserEntry,
};

/// Result-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://plauder.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://plauder.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Konten der registrierten Benutzer
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Legt ein Konto an; `DbError::Eindeutigkeit` wenn der Name vergeben ist
    async fn new_account(&self, data: NeuesKonto<'_>) -> DbResult<AccountRecord>;

    async fn get_account_by_id(&self, id: AccountId) -> DbResult<Option<AccountRecord>>;

    async fn get_account_by_username(&self, username: &str) -> DbResult<Option<AccountRecord>>;

    async fn update_online(&self, id: AccountId, online: bool) -> DbResult<()>;

    /// Alle Konten ausser `ausser`, sortiert nach Benutzername
    async fn get_users(&self, ausser: &str) -> DbResult<Vec<UserEntry>>;
}

/// Store-and-Forward-Warteschlange fuer Direktnachrichten
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn new_message(&self, msg: &QueuedMessage) -> DbResult<()>;

    /// Liest und loescht alle Nachrichten an `empfaenger` in einer Transaktion
    ///
    /// Ergebnis ist nach ID (und damit Sendezeit) sortiert.
    async fn pop_messages_for(&self, empfaenger: &str) -> DbResult<Vec<QueuedMessage>>;

    /// Entfernt Nachrichten, die vor `grenze` eingereiht wurden
    async fn purge_messages_older_than(&self, grenze: DateTime<Utc>) -> DbResult<u64>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lokaler Speicher des Clients
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Fuegt Paare ein oder ueberschreibt vorhandene Schluessel
    async fn new_key_values(&self, paare: &[(&str, &[u8])]) -> DbResult<()>;

    async fn get_value(&self, key: &str) -> DbResult<Option<Vec<u8>>>;

    async fn new_message(&self, msg: &LocalMessage) -> DbResult<()>;

    /// Markiert, liest und loescht alle Nachrichten von `absender`
    async fn pop_messages_from(&self, absender: &str) -> DbResult<Vec<LocalMessage>>;

    /// Anzahl ungelesener Nachrichten je Absender, sortiert nach Absender
    async fn unread_message_count(&self) -> DbResult<Vec<(String, u32)>>;

    async fn new_push(&self, kind: i32, data: &[u8]) -> DbResult<()>;

    /// Liest und loescht alle Praesenz-Hinweise, je Benutzer der juengste
    async fn pop_online_push_notifications(&self) -> DbResult<Vec<PraesenzHinweis>>;

    /// Loescht Zugangsdaten, Posteingang und Hinweise (Abmeldung)
    async fn drop_privacy_data(&self) -> DbResult<()>;

    /// Speichert die Anmeldedaten nach SIGNUP/SIGNIN/TOKEN
    async fn store_token(&self, id: AccountId, username: &str, token: &[u8]) -> DbResult<()> {
        let id = id.inner().to_string();
        self.new_key_values(&[
            (schluessel::ID, id.as_bytes()),
            (schluessel::USERNAME, username.as_bytes()),
            (schluessel::TOKEN, token),
        ])
        .await
    }
}

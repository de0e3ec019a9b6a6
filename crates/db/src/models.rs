//! Datenbankmodelle fuer Plauder
//!
//! Reine Datenuebertragungsobjekte, getrennt von den Wire-Typen des
//! Protokolls.

use chrono::{DateTime, Utc};
use plauder_core::AccountId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Konten (Server)
// ---------------------------------------------------------------------------

/// Konto-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub username: String,
    /// base64-kodierter bcrypt-String
    pub password_hash: String,
    pub online: bool,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anlegen eines Kontos
#[derive(Debug, Clone)]
pub struct NeuesKonto<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

/// Eintrag der Benutzerliste
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub online: bool,
}

// ---------------------------------------------------------------------------
// Nachrichten-Warteschlange (Server)
// ---------------------------------------------------------------------------

/// Zwischengespeicherte Direktnachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Snowflake-ID
    pub id: i64,
    pub kind: i32,
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Lokaler Client-Speicher
// ---------------------------------------------------------------------------

/// Schluessel im Schluessel/Wert-Speicher des Clients
pub mod schluessel {
    pub const ID: &str = "id";
    pub const USERNAME: &str = "username";
    pub const TOKEN: &str = "token";
}

/// Empfangene Nachricht im lokalen Posteingang
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    pub id: i64,
    pub kind: i32,
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub read: bool,
}

/// Juengster Praesenz-Zustand eines Benutzers aus den Push-Hinweisen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PraesenzHinweis {
    pub username: String,
    pub online: bool,
}

/// Wandelt eine Millisekunden-Spalte (`created_at`) in einen Zeitstempel
pub(crate) fn ms_zu_zeit(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

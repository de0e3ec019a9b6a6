//! plauder-db – Datenbank-Abstraktion
//!
//! Repository-Traits fuer Konten, die Nachrichten-Warteschlange des
//! Servers und den lokalen Client-Speicher, mit SQLite-Implementierungen.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use models::{AccountRecord, LocalMessage, NeuesKonto, PraesenzHinweis, QueuedMessage, UserEntry};
pub use repository::{AccountRepository, DatabaseConfig, DbResult, LocalStore, MessageRepository};
pub use sqlite::{ClientDb, SqliteDb};

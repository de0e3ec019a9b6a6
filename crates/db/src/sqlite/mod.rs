//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod accounts;
pub mod local;
pub mod messages;
pub mod pool;

pub use pool::{ClientDb, SqliteDb};

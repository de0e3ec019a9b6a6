//! SQLite Connection Pools mit WAL-Modus
//!
//! `SqliteDb` haelt die Server-Datenbank, `ClientDb` den lokalen
//! Client-Speicher. Beide verwenden eigene Migrationsverzeichnisse.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::DbError;
use crate::repository::DatabaseConfig;

async fn pool_oeffnen(config: &DatabaseConfig) -> Result<SqlitePool, DbError> {
    let opts = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(if config.sqlite_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        })
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_verbindungen)
        .connect_with(opts)
        .await?;

    info!(url = %config.url, wal = config.sqlite_wal, "SQLite-Pool geoeffnet");
    Ok(pool)
}

async fn pool_in_memory() -> Result<SqlitePool, DbError> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        // In-Memory benoetigt mindestens 1 persistente Verbindung
        .min_connections(1)
        .connect_with(opts)
        .await?;
    Ok(pool)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Server-Datenbank: Konten und Nachrichten-Warteschlange
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
}

impl SqliteDb {
    /// Erstellt einen neuen Pool, fuehrt Migrationen aus
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        let db = Self {
            pool: pool_oeffnen(config).await?,
        };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    /// Fuehrt alle ausstehenden Migrationen aus
    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations/server").run(&self.pool).await?;
        info!("Server-Migrationen abgeschlossen");
        Ok(())
    }

    /// Gibt den internen Pool zurueck (fuer Tests)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Erstellt eine In-Memory-Datenbank fuer Tests
    pub async fn in_memory() -> Result<Self, DbError> {
        let db = Self {
            pool: pool_in_memory().await?,
        };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lokaler Client-Speicher
#[derive(Debug, Clone)]
pub struct ClientDb {
    pub(crate) pool: SqlitePool,
}

impl ClientDb {
    /// Oeffnet (oder erstellt) die Datei unter `pfad`
    pub async fn oeffnen(pfad: &std::path::Path) -> Result<Self, DbError> {
        let config = DatabaseConfig {
            url: format!("sqlite://{}", pfad.display()),
            max_verbindungen: 1,
            sqlite_wal: true,
        };
        let db = Self {
            pool: pool_oeffnen(&config).await?,
        };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations/client").run(&self.pool).await?;
        info!("Client-Migrationen abgeschlossen");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn in_memory() -> Result<Self, DbError> {
        let db = Self {
            pool: pool_in_memory().await?,
        };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }
}

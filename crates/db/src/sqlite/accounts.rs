//! SQLite-Implementierung des AccountRepository

use async_trait::async_trait;
use chrono::Utc;
use plauder_core::AccountId;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{ms_zu_zeit, AccountRecord, NeuesKonto, UserEntry};
use crate::repository::{AccountRepository, DbResult};
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl AccountRepository for SqliteDb {
    async fn new_account(&self, data: NeuesKonto<'_>) -> DbResult<AccountRecord> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO accounts (username, password_hash, online, created_at)
             VALUES (?, ?, 0, ?)",
        )
        .bind(data.username)
        .bind(data.password_hash)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DbError::Eindeutigkeit(
                format!("Benutzername '{}' bereits vergeben", data.username),
            ),
            e => DbError::Sqlx(e),
        })?;

        Ok(AccountRecord {
            id: AccountId(result.last_insert_rowid() as u64),
            username: data.username.to_string(),
            password_hash: data.password_hash.to_string(),
            online: false,
            created_at: ms_zu_zeit(now.timestamp_millis()),
        })
    }

    async fn get_account_by_id(&self, id: AccountId) -> DbResult<Option<AccountRecord>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, online, created_at
             FROM accounts WHERE id = ?",
        )
        .bind(id.inner() as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_konto(&r)).transpose()
    }

    async fn get_account_by_username(&self, username: &str) -> DbResult<Option<AccountRecord>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, online, created_at
             FROM accounts WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_konto(&r)).transpose()
    }

    async fn update_online(&self, id: AccountId, online: bool) -> DbResult<()> {
        let affected = sqlx::query("UPDATE accounts SET online = ? WHERE id = ?")
            .bind(online as i64)
            .bind(id.inner() as i64)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Konto {id}")));
        }
        Ok(())
    }

    async fn get_users(&self, ausser: &str) -> DbResult<Vec<UserEntry>> {
        let rows = sqlx::query(
            "SELECT username, online FROM accounts
             WHERE username <> ? ORDER BY username",
        )
        .bind(ausser)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> DbResult<UserEntry> {
                let online: i64 = r.try_get("online")?;
                Ok(UserEntry {
                    username: r.try_get("username")?,
                    online: online != 0,
                })
            })
            .collect()
    }
}

fn row_to_konto(row: &sqlx::sqlite::SqliteRow) -> DbResult<AccountRecord> {
    let id: i64 = row.try_get("id")?;
    let online: i64 = row.try_get("online")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(AccountRecord {
        id: AccountId(id as u64),
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        online: online != 0,
        created_at: ms_zu_zeit(created_at),
    })
}

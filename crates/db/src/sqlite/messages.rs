//! SQLite-Implementierung der Nachrichten-Warteschlange
//!
//! `pop_messages_for` liest und loescht in derselben Transaktion, damit
//! jede Nachricht hoechstens einmal zugestellt wird.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row as _;

use crate::models::{ms_zu_zeit, QueuedMessage};
use crate::repository::{DbResult, MessageRepository};
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl MessageRepository for SqliteDb {
    async fn new_message(&self, msg: &QueuedMessage) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO queued_messages (id, kind, sender, recipient, data, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.id)
        .bind(msg.kind)
        .bind(&msg.from)
        .bind(&msg.to)
        .bind(&msg.data)
        .bind(msg.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pop_messages_for(&self, empfaenger: &str) -> DbResult<Vec<QueuedMessage>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, kind, sender, recipient, data, created_at
             FROM queued_messages WHERE recipient = ? ORDER BY id",
        )
        .bind(empfaenger)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let nachrichten = rows
            .iter()
            .map(row_to_nachricht)
            .collect::<DbResult<Vec<_>>>()?;

        for n in &nachrichten {
            sqlx::query("DELETE FROM queued_messages WHERE id = ?")
                .bind(n.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(nachrichten)
    }

    async fn purge_messages_older_than(&self, grenze: DateTime<Utc>) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM queued_messages WHERE created_at < ?")
            .bind(grenze.timestamp_millis())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<QueuedMessage> {
    let created_at: i64 = row.try_get("created_at")?;
    Ok(QueuedMessage {
        id: row.try_get("id")?,
        kind: row.try_get("kind")?,
        from: row.try_get("sender")?,
        to: row.try_get("recipient")?,
        data: row.try_get("data")?,
        created_at: ms_zu_zeit(created_at),
    })
}

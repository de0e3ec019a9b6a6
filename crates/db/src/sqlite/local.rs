//! SQLite-Implementierung des lokalen Client-Speichers

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row as _;
use std::collections::BTreeMap;

use crate::models::{LocalMessage, PraesenzHinweis};
use crate::repository::{DbResult, LocalStore};
use crate::sqlite::pool::ClientDb;

/// `Push.kind` fuer "Benutzer ist online"
const PUSH_ONLINE: i64 = 0;

#[async_trait]
impl LocalStore for ClientDb {
    async fn new_key_values(&self, paare: &[(&str, &[u8])]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in paare {
            sqlx::query(
                "INSERT INTO key_values (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(*key)
            .bind(*value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| r.try_get::<Vec<u8>, _>("value"))
            .transpose()?)
    }

    async fn new_message(&self, msg: &LocalMessage) -> DbResult<()> {
        // Doppelte Zustellung derselben Server-ID ignorieren
        sqlx::query(
            "INSERT OR IGNORE INTO messages (id, kind, sender, recipient, data, read)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.id)
        .bind(msg.kind)
        .bind(&msg.from)
        .bind(&msg.to)
        .bind(&msg.data)
        .bind(msg.read as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pop_messages_from(&self, absender: &str) -> DbResult<Vec<LocalMessage>> {
        let mut tx = self.pool.begin().await?;

        let markiert = sqlx::query("UPDATE messages SET read = 1 WHERE sender = ?")
            .bind(absender)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if markiert == 0 {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, kind, sender, recipient, data, read
             FROM messages WHERE sender = ? ORDER BY id",
        )
        .bind(absender)
        .fetch_all(&mut *tx)
        .await?;

        let nachrichten = rows
            .iter()
            .map(|r| -> DbResult<LocalMessage> {
                let read: i64 = r.try_get("read")?;
                Ok(LocalMessage {
                    id: r.try_get("id")?,
                    kind: r.try_get("kind")?,
                    from: r.try_get("sender")?,
                    to: r.try_get("recipient")?,
                    data: r.try_get("data")?,
                    read: read != 0,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM messages WHERE sender = ?")
            .bind(absender)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(nachrichten)
    }

    async fn unread_message_count(&self) -> DbResult<Vec<(String, u32)>> {
        let rows = sqlx::query(
            "SELECT sender, COUNT(*) AS anzahl FROM messages
             WHERE read = 0 GROUP BY sender ORDER BY sender",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> DbResult<(String, u32)> {
                let anzahl: i64 = r.try_get("anzahl")?;
                Ok((r.try_get("sender")?, anzahl as u32))
            })
            .collect()
    }

    async fn new_push(&self, kind: i32, data: &[u8]) -> DbResult<()> {
        sqlx::query("INSERT INTO pushes (kind, data, created_at) VALUES (?, ?, ?)")
            .bind(kind)
            .bind(data)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pop_online_push_notifications(&self) -> DbResult<Vec<PraesenzHinweis>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("SELECT kind, data FROM pushes ORDER BY id")
            .fetch_all(&mut *tx)
            .await?;

        // Spaetere Hinweise ueberschreiben fruehere desselben Benutzers
        let mut juengste: BTreeMap<String, bool> = BTreeMap::new();
        for r in &rows {
            let kind: i64 = r.try_get("kind")?;
            let data: Vec<u8> = r.try_get("data")?;
            match String::from_utf8(data) {
                Ok(username) => {
                    juengste.insert(username, kind == PUSH_ONLINE);
                }
                Err(_) => tracing::debug!("Push-Hinweis mit ungueltigem Benutzernamen verworfen"),
            }
        }

        sqlx::query("DELETE FROM pushes").execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(juengste
            .into_iter()
            .map(|(username, online)| PraesenzHinweis { username, online })
            .collect())
    }

    async fn drop_privacy_data(&self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for tabelle in ["key_values", "messages", "pushes"] {
            sqlx::query(&format!("DELETE FROM {tabelle}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::info!("Lokale Daten geloescht");
        Ok(())
    }
}

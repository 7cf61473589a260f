//! Repository for thread and message persistence.

use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::error::{ChatError, ChatResult};
use super::models::{
    ListOptions, Message, MessageRow, NewMessage, NewThread, Thread, ThreadPage, ThreadRow,
    ThreadUpdate, new_message_id, new_thread_id,
};
use super::parts::{self, Part, PartRow};

/// Part row joined with the id of its message.
#[derive(Debug, FromRow)]
struct StoredPartRow {
    message_id: String,
    #[sqlx(flatten)]
    part: PartRow,
}

/// Thread store backed by SQLite.
#[derive(Debug, Clone)]
pub struct ThreadRepository {
    pool: SqlitePool,
}

impl ThreadRepository {
    /// Create a new repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========== Thread Operations ==========

    /// Create a thread and return the stored record.
    pub async fn create_thread(&self, new: NewThread) -> ChatResult<Thread> {
        new.agent.validate()?;

        let id = new.id.unwrap_or_else(new_thread_id);
        let now = Utc::now().timestamp_millis();
        let metadata = Value::Object(new.metadata).to_string();

        sqlx::query(
            r#"
            INSERT INTO threads (id, user_id, user_role, agent_type, event_id, venue_id,
                                 title, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.owner.user_id)
        .bind(new.owner.role.to_string())
        .bind(new.agent.agent_type.as_str())
        .bind(&new.agent.event_id)
        .bind(&new.agent.venue_id)
        .bind(&new.title)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("inserting thread")?;

        self.get_thread(&id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("thread {id}")))
    }

    /// Get a thread by id.
    pub async fn get_thread(&self, id: &str) -> ChatResult<Option<Thread>> {
        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, user_id, user_role, agent_type, event_id, venue_id,
                   title, metadata, created_at, updated_at
            FROM threads
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching thread")?;

        Ok(row.map(Thread::try_from).transpose()?)
    }

    /// Get a thread by id, only if it belongs to `user_id`.
    pub async fn get_thread_for_owner(&self, id: &str, user_id: &str) -> ChatResult<Option<Thread>> {
        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, user_id, user_role, agent_type, event_id, venue_id,
                   title, metadata, created_at, updated_at
            FROM threads
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching owned thread")?;

        Ok(row.map(Thread::try_from).transpose()?)
    }

    /// List a user's threads, most recently active first.
    pub async fn list_threads(&self, user_id: &str, options: ListOptions) -> ChatResult<ThreadPage> {
        let limit = options.limit.max(0);
        let offset = options.offset.max(0);

        let rows = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, user_id, user_role, agent_type, event_id, venue_id,
                   title, metadata, created_at, updated_at
            FROM threads
            WHERE user_id = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("listing threads")?;

        let threads = rows
            .into_iter()
            .map(Thread::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let has_more = limit > 0 && threads.len() as i64 == limit;

        Ok(ThreadPage { threads, has_more })
    }

    /// Update the mutable fields of a thread.
    ///
    /// Returns `None` when the thread does not exist.
    pub async fn update_thread(&self, id: &str, update: ThreadUpdate) -> ChatResult<Option<Thread>> {
        if update.is_empty() {
            return self.get_thread(id).await;
        }

        let metadata = update.metadata.map(|m| Value::Object(m).to_string());
        let result = sqlx::query(
            r#"
            UPDATE threads
            SET title = COALESCE(?, title),
                metadata = COALESCE(?, metadata),
                updated_at = MAX(updated_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&metadata)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("updating thread")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_thread(id).await
    }

    /// Delete a thread with all of its messages and parts.
    pub async fn delete_thread(&self, id: &str) -> ChatResult<bool> {
        let mut tx = self.pool.begin().await.context("starting transaction")?;

        sqlx::query(
            "DELETE FROM message_parts WHERE message_id IN (SELECT id FROM messages WHERE thread_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("deleting thread message parts")?;

        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("deleting thread messages")?;

        let result = sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("deleting thread")?;

        tx.commit().await.context("committing thread delete")?;

        Ok(result.rows_affected() > 0)
    }

    // ========== Message Operations ==========

    /// Append a message to a thread.
    ///
    /// The message row, all part rows and the thread touch commit together.
    pub async fn add_message(&self, thread_id: &str, new: NewMessage) -> ChatResult<Message> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await.context("starting transaction")?;

        // First statement writes, so the transaction holds the write lock from here on.
        let touched = sqlx::query("UPDATE threads SET updated_at = MAX(updated_at, ?) WHERE id = ?")
            .bind(now)
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .context("touching thread")?;
        if touched.rows_affected() == 0 {
            return Err(ChatError::not_found(format!("thread {thread_id}")));
        }

        let id = new_message_id();
        let (seq, created_at) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            INSERT INTO messages (id, thread_id, seq, role, created_at)
            VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE thread_id = ?2),
                ?3,
                MAX(?4, (SELECT COALESCE(MAX(created_at), 0) FROM messages WHERE thread_id = ?2))
            )
            RETURNING seq, created_at
            "#,
        )
        .bind(&id)
        .bind(thread_id)
        .bind(new.role.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .context("inserting message")?;

        insert_parts(&mut *tx, &id, &new.parts).await?;

        tx.commit().await.context("committing message")?;

        let message = MessageRow {
            id,
            thread_id: thread_id.to_string(),
            seq,
            role: new.role.as_str().to_string(),
            created_at,
        }
        .into_message(new.parts)?;

        tracing::debug!(
            thread_id = %thread_id,
            message_id = %message.id,
            seq,
            parts = message.parts.len(),
            "Appended message"
        );

        Ok(message)
    }

    /// List the messages of a thread in order.
    pub async fn list_messages(&self, thread_id: &str) -> ChatResult<Vec<Message>> {
        // Both reads share one snapshot so a concurrent write cannot split them.
        let mut tx = self.pool.begin().await.context("starting transaction")?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, thread_id, seq, role, created_at
            FROM messages
            WHERE thread_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await
        .context("listing messages")?;

        let part_rows = sqlx::query_as::<_, StoredPartRow>(
            r#"
            SELECT p.message_id, p.ordinal, p.part_type, p.text_value,
                   p.file_media_type, p.file_filename, p.file_url,
                   p.source_id, p.source_url, p.source_title, p.source_media_type, p.source_filename,
                   p.tool_call_id, p.tool_name, p.tool_state, p.tool_input, p.tool_output,
                   p.tool_error_text, p.data_id, p.payload, p.provider_metadata, p.extra
            FROM message_parts p
            JOIN messages m ON m.id = p.message_id
            WHERE m.thread_id = ?
            ORDER BY m.seq ASC, p.ordinal ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await
        .context("listing message parts")?;

        tx.commit().await.context("closing message read")?;

        let mut parts_by_message: HashMap<String, Vec<Part>> = HashMap::new();
        for row in part_rows {
            let part = parts::decode(&row.part)
                .with_context(|| format!("decoding part of message {}", row.message_id))?;
            parts_by_message.entry(row.message_id).or_default().push(part);
        }

        let messages = rows
            .into_iter()
            .map(|row| {
                let parts = parts_by_message.remove(&row.id).unwrap_or_default();
                row.into_message(parts)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(messages)
    }

    /// Get a single message by id.
    pub async fn get_message(&self, id: &str) -> ChatResult<Option<Message>> {
        let mut tx = self.pool.begin().await.context("starting transaction")?;

        let Some(row) = sqlx::query_as::<_, MessageRow>(
            "SELECT id, thread_id, seq, role, created_at FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("fetching message")?
        else {
            return Ok(None);
        };

        let part_rows = sqlx::query_as::<_, PartRow>(
            r#"
            SELECT ordinal, part_type, text_value,
                   file_media_type, file_filename, file_url,
                   source_id, source_url, source_title, source_media_type, source_filename,
                   tool_call_id, tool_name, tool_state, tool_input, tool_output,
                   tool_error_text, data_id, payload, provider_metadata, extra
            FROM message_parts
            WHERE message_id = ?
            ORDER BY ordinal ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .context("fetching message parts")?;

        tx.commit().await.context("closing message read")?;

        let parts = part_rows
            .iter()
            .map(parts::decode)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("decoding parts of message {id}"))?;

        Ok(Some(row.into_message(parts)?))
    }

    /// Replace every part of a message. The role is left untouched.
    ///
    /// Returns `None` when the message does not exist.
    pub async fn replace_message_parts(
        &self,
        id: &str,
        parts: Vec<Part>,
    ) -> ChatResult<Option<Message>> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await.context("starting transaction")?;

        let touched = sqlx::query(
            "UPDATE threads SET updated_at = MAX(updated_at, ?) WHERE id = (SELECT thread_id FROM messages WHERE id = ?)",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("touching thread")?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM message_parts WHERE message_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("deleting message parts")?;

        insert_parts(&mut *tx, id, &parts).await?;

        tx.commit().await.context("committing part replacement")?;

        self.get_message(id).await
    }
}

/// Insert the rows of `parts` with ordinals `0..n`.
async fn insert_parts(
    conn: &mut SqliteConnection,
    message_id: &str,
    parts: &[Part],
) -> anyhow::Result<()> {
    for (ordinal, part) in parts.iter().enumerate() {
        let row = parts::encode(part, ordinal);
        sqlx::query(
            r#"
            INSERT INTO message_parts (
                message_id, ordinal, part_type, text_value,
                file_media_type, file_filename, file_url,
                source_id, source_url, source_title, source_media_type, source_filename,
                tool_call_id, tool_name, tool_state, tool_input, tool_output,
                tool_error_text, data_id, payload, provider_metadata, extra
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message_id)
        .bind(row.ordinal)
        .bind(&row.part_type)
        .bind(&row.text_value)
        .bind(&row.file_media_type)
        .bind(&row.file_filename)
        .bind(&row.file_url)
        .bind(&row.source_id)
        .bind(&row.source_url)
        .bind(&row.source_title)
        .bind(&row.source_media_type)
        .bind(&row.source_filename)
        .bind(&row.tool_call_id)
        .bind(&row.tool_name)
        .bind(&row.tool_state)
        .bind(&row.tool_input)
        .bind(&row.tool_output)
        .bind(&row.tool_error_text)
        .bind(&row.data_id)
        .bind(&row.payload)
        .bind(&row.provider_metadata)
        .bind(&row.extra)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("inserting part {} of message {}", ordinal, message_id))?;
    }
    Ok(())
}

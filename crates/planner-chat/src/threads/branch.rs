//! Branch editing: truncating a thread at a message.

use anyhow::Context;
use chrono::Utc;

use super::error::{ChatError, ChatResult};
use super::repository::ThreadRepository;

/// Removes a message and every later message of its thread.
///
/// Used when a user edits an earlier turn or regenerates a response.
#[derive(Debug, Clone)]
pub struct BranchEditor {
    threads: ThreadRepository,
}

impl BranchEditor {
    pub fn new(threads: ThreadRepository) -> Self {
        Self { threads }
    }

    /// Delete `message_id` and all messages after it, returning how many were removed.
    pub async fn delete_message_and_descendants(&self, message_id: &str) -> ChatResult<usize> {
        let mut tx = self
            .threads
            .pool()
            .begin()
            .await
            .context("starting transaction")?;

        let touched = sqlx::query(
            "UPDATE threads SET updated_at = MAX(updated_at, ?) WHERE id = (SELECT thread_id FROM messages WHERE id = ?)",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(message_id)
        .execute(&mut *tx)
        .await
        .context("touching thread")?;
        if touched.rows_affected() == 0 {
            return Err(ChatError::not_found(format!("message {message_id}")));
        }

        let (thread_id, seq) = sqlx::query_as::<_, (String, i64)>(
            "SELECT thread_id, seq FROM messages WHERE id = ?",
        )
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await
        .context("resolving message position")?;

        sqlx::query(
            r#"
            DELETE FROM message_parts
            WHERE message_id IN (SELECT id FROM messages WHERE thread_id = ? AND seq >= ?)
            "#,
        )
        .bind(&thread_id)
        .bind(seq)
        .execute(&mut *tx)
        .await
        .context("deleting branch parts")?;

        let deleted = sqlx::query("DELETE FROM messages WHERE thread_id = ? AND seq >= ?")
            .bind(&thread_id)
            .bind(seq)
            .execute(&mut *tx)
            .await
            .context("deleting branch messages")?
            .rows_affected();

        tx.commit().await.context("committing branch delete")?;

        tracing::info!(
            thread_id = %thread_id,
            message_id = %message_id,
            deleted,
            "Deleted message branch"
        );

        Ok(deleted as usize)
    }
}

//! SQLite document store for conversations and messages.
//!
//! Implements `ConversationStore` from `kindred-core`. Message payloads are
//! stored as tagged JSON documents; ordering is `(created_at, seq)` where
//! `seq` is the AUTOINCREMENT rowid assigned on insert.

use chrono::{DateTime, Utc};
use kindred_core::conversation::repository::{ConversationStore, MessageSlice};
use kindred_types::chat::{
    Conversation, Message, MessageCursor, MessagePayload, NewMessage, SenderKind, Sentiment,
    SentimentLabel,
};
use kindred_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_count, parse_datetime, parse_uuid, query_err};

/// SQLite-backed implementation of `ConversationStore`.
pub struct SqliteConversationStore {
    pool: DatabasePool,
}

impl SqliteConversationStore {
    /// Create a new store backed by the given document pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    user_id: String,
    companion_id: String,
    archived: bool,
    created_at: String,
    updated_at: String,
    last_activity_at: Option<String>,
    message_count: i64,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            companion_id: row.try_get("companion_id")?,
            archived: row.try_get("archived")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_activity_at: row.try_get("last_activity_at")?,
            message_count: row.try_get("message_count")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: parse_uuid(&self.id, "conversation id")?,
            user_id: parse_uuid(&self.user_id, "user_id")?,
            companion_id: parse_uuid(&self.companion_id, "companion_id")?,
            archived: self.archived,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            last_activity_at: self
                .last_activity_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            message_count: parse_count(self.message_count, "message_count")?,
        })
    }
}

struct MessageRow {
    seq: i64,
    id: String,
    conversation_id: String,
    sender: String,
    payload: String,
    sentiment_label: String,
    sentiment_score: f64,
    token_count: i64,
    is_read: bool,
    quality_score: Option<f64>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            seq: row.try_get("seq")?,
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender: row.try_get("sender")?,
            payload: row.try_get("payload")?,
            sentiment_label: row.try_get("sentiment_label")?,
            sentiment_score: row.try_get("sentiment_score")?,
            token_count: row.try_get("token_count")?,
            is_read: row.try_get("is_read")?,
            quality_score: row.try_get("quality_score")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// The message plus its position in the conversation order.
    fn into_message(self) -> Result<(MessageCursor, Message), RepositoryError> {
        let sender: SenderKind = self.sender.parse().map_err(RepositoryError::Query)?;
        let label: SentimentLabel = self
            .sentiment_label
            .parse()
            .map_err(RepositoryError::Query)?;
        let payload: MessagePayload = serde_json::from_str(&self.payload)
            .map_err(|e| RepositoryError::Query(format!("invalid payload document: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;

        let message = Message {
            id: parse_uuid(&self.id, "message id")?,
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id")?,
            sender,
            payload,
            sentiment: Sentiment {
                label,
                score: self.sentiment_score as f32,
            },
            token_count: parse_count(self.token_count, "token_count")?,
            read: self.is_read,
            quality_score: self.quality_score.map(|q| q as f32),
            created_at,
        };
        Ok((
            MessageCursor {
                created_at,
                seq: self.seq,
            },
            message,
        ))
    }
}

fn collect_messages(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<(MessageCursor, Message)>, RepositoryError> {
    rows.iter()
        .map(|row| MessageRow::from_row(row).map_err(query_err)?.into_message())
        .collect()
}

fn collect_conversations(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Conversation>, RepositoryError> {
    rows.iter()
        .map(|row| {
            ConversationRow::from_row(row)
                .map_err(query_err)?
                .into_conversation()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ConversationStore implementation
// ---------------------------------------------------------------------------

impl ConversationStore for SqliteConversationStore {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (id, user_id, companion_id, archived, created_at, updated_at, last_activity_at, message_count)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.user_id.to_string())
        .bind(conversation.companion_id.to_string())
        .bind(conversation.archived)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .bind(conversation.last_activity_at.as_ref().map(format_datetime))
        .bind(conversation.message_count as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                RepositoryError::Conflict(format!("conversation {} already exists", conversation.id))
            } else {
                query_err(e)
            }
        })?;

        Ok(conversation.clone())
    }

    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(query_err)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn find_active_conversation(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT * FROM conversations
               WHERE user_id = ? AND companion_id = ? AND archived = 0
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(user_id.to_string())
        .bind(companion_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(query_err)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
        include_archived: bool,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM conversations WHERE user_id = ?");
        if !include_archived {
            sql.push_str(" AND archived = 0");
        }
        sql.push_str(" ORDER BY COALESCE(last_activity_at, created_at) DESC");

        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        collect_conversations(&rows)
    }

    async fn set_archived(
        &self,
        conversation_id: &Uuid,
        archived: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET archived = ?, updated_at = ? WHERE id = ?")
            .bind(archived)
            .bind(format_datetime(&at))
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: &Uuid,
        message: NewMessage,
    ) -> Result<Message, RepositoryError> {
        let payload = serde_json::to_string(&message.payload)
            .map_err(|e| RepositoryError::Query(format!("failed to encode payload: {e}")))?;

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        // Never place a message before one already stored, even if the clock
        // stepped backwards.
        let latest: Option<String> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(query_err)?;
        let mut created_at = Utc::now();
        if let Some(latest) = latest.as_deref().map(parse_datetime).transpose()? {
            created_at = created_at.max(latest);
        }

        let updated = sqlx::query(
            r#"UPDATE conversations
               SET message_count = message_count + 1, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(format_datetime(&created_at))
        .bind(conversation_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let stored = Message {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            sender: message.sender,
            payload: message.payload,
            sentiment: message.sentiment,
            token_count: message.token_count,
            read: message.sender == SenderKind::User,
            quality_score: message.quality_score,
            created_at,
        };

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, sender, kind, payload, sentiment_label, sentiment_score, token_count, is_read, quality_score, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stored.id.to_string())
        .bind(conversation_id.to_string())
        .bind(stored.sender.to_string())
        .bind(stored.kind().to_string())
        .bind(&payload)
        .bind(stored.sentiment.label.to_string())
        .bind(f64::from(stored.sentiment.score))
        .bind(stored.token_count as i64)
        .bind(stored.read)
        .bind(stored.quality_score.map(f64::from))
        .bind(format_datetime(&created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
        after: Option<&MessageCursor>,
        limit: u32,
    ) -> Result<MessageSlice, RepositoryError> {
        // Fetch one extra row to learn whether another page follows.
        let fetch = i64::from(limit) + 1;
        let rows = match after {
            Some(cursor) => {
                let at = format_datetime(&cursor.created_at);
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE conversation_id = ?
                         AND (created_at > ? OR (created_at = ? AND seq > ?))
                       ORDER BY created_at ASC, seq ASC
                       LIMIT ?"#,
                )
                .bind(conversation_id.to_string())
                .bind(&at)
                .bind(&at)
                .bind(cursor.seq)
                .bind(fetch)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE conversation_id = ?
                       ORDER BY created_at ASC, seq ASC
                       LIMIT ?"#,
                )
                .bind(conversation_id.to_string())
                .bind(fetch)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(query_err)?;

        let mut entries = collect_messages(&rows)?;
        let has_more = entries.len() > limit as usize;
        entries.truncate(limit as usize);

        let next = if has_more {
            entries.last().map(|(cursor, _)| *cursor)
        } else {
            None
        };

        Ok(MessageSlice {
            messages: entries.into_iter().map(|(_, m)| m).collect(),
            next,
        })
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE conversation_id = ?
               ORDER BY created_at DESC, seq DESC
               LIMIT ?"#,
        )
        .bind(conversation_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut messages: Vec<Message> = collect_messages(&rows)?
            .into_iter()
            .map(|(_, m)| m)
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn get_message(&self, message_id: &Uuid) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(message_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let (_, message) = MessageRow::from_row(&row).map_err(query_err)?.into_message()?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn mark_read(
        &self,
        conversation_id: &Uuid,
        up_to: Option<&Uuid>,
    ) -> Result<u32, RepositoryError> {
        let result = match up_to {
            Some(message_id) => {
                let bound = sqlx::query(
                    "SELECT created_at, seq FROM messages WHERE id = ? AND conversation_id = ?",
                )
                .bind(message_id.to_string())
                .bind(conversation_id.to_string())
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(query_err)?
                .ok_or(RepositoryError::NotFound)?;

                let at: String = bound.try_get("created_at").map_err(query_err)?;
                let seq: i64 = bound.try_get("seq").map_err(query_err)?;

                sqlx::query(
                    r#"UPDATE messages SET is_read = 1
                       WHERE conversation_id = ? AND sender = 'companion' AND is_read = 0
                         AND (created_at < ? OR (created_at = ? AND seq <= ?))"#,
                )
                .bind(conversation_id.to_string())
                .bind(&at)
                .bind(&at)
                .bind(seq)
                .execute(&self.pool.writer)
                .await
            }
            None => {
                sqlx::query(
                    r#"UPDATE messages SET is_read = 1
                       WHERE conversation_id = ? AND sender = 'companion' AND is_read = 0"#,
                )
                .bind(conversation_id.to_string())
                .execute(&self.pool.writer)
                .await
            }
        }
        .map_err(query_err)?;

        Ok(u32::try_from(result.rows_affected()).unwrap_or(u32::MAX))
    }

    async fn touch_activity(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let stamp = format_datetime(&at);
        sqlx::query(
            r#"UPDATE conversations
               SET last_activity_at = MAX(COALESCE(last_activity_at, ''), ?), updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(conversation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use kindred_types::chat::MessageKind;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("documents.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::documents(&url).await.unwrap()
    }

    fn new_message(sender: SenderKind, payload: MessagePayload) -> NewMessage {
        NewMessage {
            sender,
            payload,
            sentiment: Sentiment::default(),
            token_count: 3,
            quality_score: None,
        }
    }

    async fn store_with_conversation() -> (SqliteConversationStore, Conversation) {
        let store = SqliteConversationStore::new(test_pool().await);
        let conversation = Conversation::new(Uuid::now_v7(), Uuid::now_v7());
        store.create_conversation(&conversation).await.unwrap();
        (store, conversation)
    }

    #[tokio::test]
    async fn test_create_and_get_conversation() {
        let (store, conversation) = store_with_conversation().await;

        let loaded = store.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, conversation.id);
        assert_eq!(loaded.user_id, conversation.user_id);
        assert!(!loaded.archived);
        assert_eq!(loaded.message_count, 0);

        assert!(store.get_conversation(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_conversation_conflicts() {
        let (store, conversation) = store_with_conversation().await;
        let err = store.create_conversation(&conversation).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_message_stores_payload_document() {
        let (store, conversation) = store_with_conversation().await;

        let text = store
            .create_message(
                &conversation.id,
                new_message(SenderKind::User, MessagePayload::text("Hi")),
            )
            .await
            .unwrap();
        let photo = store
            .create_message(
                &conversation.id,
                new_message(
                    SenderKind::Companion,
                    MessagePayload::Photo {
                        media_ref: "media/sunset.jpg".to_string(),
                    },
                ),
            )
            .await
            .unwrap();

        assert!(text.read, "user messages are born read");
        assert!(!photo.read);
        assert!(photo.created_at >= text.created_at);

        let loaded = store.get_message(&photo.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind(), MessageKind::Photo);
        assert_eq!(loaded.payload.media_ref(), Some("media/sunset.jpg"));

        let conversation = store.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(conversation.message_count, 2);
    }

    #[tokio::test]
    async fn test_corrupt_counts_are_query_errors() {
        let (store, conversation) = store_with_conversation().await;
        sqlx::query("UPDATE conversations SET message_count = -1 WHERE id = ?")
            .bind(conversation.id.to_string())
            .execute(&store.pool.writer)
            .await
            .unwrap();

        let err = store.get_conversation(&conversation.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[tokio::test]
    async fn test_create_message_in_missing_conversation() {
        let store = SqliteConversationStore::new(test_pool().await);
        let err = store
            .create_message(
                &Uuid::now_v7(),
                new_message(SenderKind::User, MessagePayload::text("Hi")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_pagination_walks_every_message_once() {
        let (store, conversation) = store_with_conversation().await;
        let mut ids = Vec::new();
        for i in 0..7 {
            let m = store
                .create_message(
                    &conversation.id,
                    new_message(SenderKind::User, MessagePayload::text(format!("m{i}"))),
                )
                .await
                .unwrap();
            ids.push(m.id);
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let slice = store
                .list_messages(&conversation.id, cursor.as_ref(), 3)
                .await
                .unwrap();
            seen.extend(slice.messages.iter().map(|m| m.id));
            match slice.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn test_pagination_breaks_timestamp_ties_by_seq() {
        let (store, conversation) = store_with_conversation().await;
        let at = format_datetime(&Utc::now());
        for i in 0..4 {
            sqlx::query(
                r#"INSERT INTO messages (id, conversation_id, sender, kind, payload, sentiment_label, sentiment_score, token_count, is_read, quality_score, created_at)
                   VALUES (?, ?, 'user', 'text', ?, 'neutral', 0, 1, 1, NULL, ?)"#,
            )
            .bind(Uuid::now_v7().to_string())
            .bind(conversation.id.to_string())
            .bind(format!(r#"{{"type":"text","content":"same {i}"}}"#))
            .bind(&at)
            .execute(&store.pool.writer)
            .await
            .unwrap();
        }

        let first = store.list_messages(&conversation.id, None, 2).await.unwrap();
        let second = store
            .list_messages(&conversation.id, first.next.as_ref(), 2)
            .await
            .unwrap();

        let contents: Vec<String> = first
            .messages
            .iter()
            .chain(second.messages.iter())
            .map(|m| m.payload.render())
            .collect();
        assert_eq!(contents, vec!["same 0", "same 1", "same 2", "same 3"]);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_recent_messages_are_oldest_first() {
        let (store, conversation) = store_with_conversation().await;
        for i in 0..5 {
            store
                .create_message(
                    &conversation.id,
                    new_message(SenderKind::User, MessagePayload::text(format!("m{i}"))),
                )
                .await
                .unwrap();
        }

        let recent = store.recent_messages(&conversation.id, 2).await.unwrap();
        let texts: Vec<String> = recent.iter().map(|m| m.payload.render()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn test_mark_read_up_to_message() {
        let (store, conversation) = store_with_conversation().await;
        let mut replies = Vec::new();
        for i in 0..3 {
            store
                .create_message(
                    &conversation.id,
                    new_message(SenderKind::User, MessagePayload::text(format!("q{i}"))),
                )
                .await
                .unwrap();
            let reply = store
                .create_message(
                    &conversation.id,
                    new_message(SenderKind::Companion, MessagePayload::text(format!("a{i}"))),
                )
                .await
                .unwrap();
            replies.push(reply.id);
        }

        let changed = store
            .mark_read(&conversation.id, Some(&replies[1]))
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let last = store.get_message(&replies[2]).await.unwrap().unwrap();
        assert!(!last.read);

        assert_eq!(store.mark_read(&conversation.id, None).await.unwrap(), 1);
        assert_eq!(store.mark_read(&conversation.id, None).await.unwrap(), 0);

        let err = store
            .mark_read(&conversation.id, Some(&Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_archive_and_active_lookup() {
        let (store, conversation) = store_with_conversation().await;

        let active = store
            .find_active_conversation(&conversation.user_id, &conversation.companion_id)
            .await
            .unwrap();
        assert_eq!(active.map(|c| c.id), Some(conversation.id));

        store
            .set_archived(&conversation.id, true, Utc::now())
            .await
            .unwrap();
        assert!(
            store
                .find_active_conversation(&conversation.user_id, &conversation.companion_id)
                .await
                .unwrap()
                .is_none()
        );

        let visible = store
            .list_conversations(&conversation.user_id, false)
            .await
            .unwrap();
        assert!(visible.is_empty());
        let all = store
            .list_conversations(&conversation.user_id, true)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].archived);

        let err = store
            .set_archived(&Uuid::now_v7(), true, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_touch_activity_orders_conversation_list() {
        let store = SqliteConversationStore::new(test_pool().await);
        let user = Uuid::now_v7();
        let older = Conversation::new(user, Uuid::now_v7());
        let newer = Conversation::new(user, Uuid::now_v7());
        store.create_conversation(&older).await.unwrap();
        store.create_conversation(&newer).await.unwrap();

        store
            .touch_activity(&older.id, Utc::now() + chrono::Duration::seconds(5))
            .await
            .unwrap();

        let list = store.list_conversations(&user, false).await.unwrap();
        assert_eq!(list[0].id, older.id);
        assert!(list[0].last_activity_at.is_some());
    }
}

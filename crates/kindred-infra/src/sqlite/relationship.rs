//! SQLite relationship repository implementation.
//!
//! One row per (user, companion) pair; `save` is an upsert on that key.

use kindred_core::relationship::repository::RelationshipRepository;
use kindred_types::error::RepositoryError;
use kindred_types::relationship::RelationshipState;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_count, parse_datetime, parse_uuid, query_err};

/// SQLite-backed implementation of `RelationshipRepository`.
pub struct SqliteRelationshipRepository {
    pool: DatabasePool,
}

impl SqliteRelationshipRepository {
    /// Create a new repository backed by the given relational pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct RelationshipRow {
    user_id: String,
    companion_id: String,
    stage: String,
    intimacy_level: i64,
    message_count: i64,
    last_interaction_at: Option<String>,
    started_at: String,
    last_exchange_id: Option<String>,
    decayed_through: Option<String>,
    updated_at: String,
}

impl RelationshipRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            companion_id: row.try_get("companion_id")?,
            stage: row.try_get("stage")?,
            intimacy_level: row.try_get("intimacy_level")?,
            message_count: row.try_get("message_count")?,
            last_interaction_at: row.try_get("last_interaction_at")?,
            started_at: row.try_get("started_at")?,
            last_exchange_id: row.try_get("last_exchange_id")?,
            decayed_through: row.try_get("decayed_through")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_state(self) -> Result<RelationshipState, RepositoryError> {
        Ok(RelationshipState {
            user_id: parse_uuid(&self.user_id, "user_id")?,
            companion_id: parse_uuid(&self.companion_id, "companion_id")?,
            stage: self.stage,
            intimacy_level: parse_count(self.intimacy_level, "intimacy_level")?,
            message_count: parse_count(self.message_count, "message_count")?,
            last_interaction_at: self
                .last_interaction_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            started_at: parse_datetime(&self.started_at)?,
            last_exchange_id: self
                .last_exchange_id
                .as_deref()
                .map(|id| parse_uuid(id, "last_exchange_id"))
                .transpose()?,
            decayed_through: self
                .decayed_through
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// RelationshipRepository implementation
// ---------------------------------------------------------------------------

impl RelationshipRepository for SqliteRelationshipRepository {
    async fn get(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> Result<Option<RelationshipState>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM relationship_states WHERE user_id = ? AND companion_id = ?",
        )
        .bind(user_id.to_string())
        .bind(companion_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                RelationshipRow::from_row(&row)
                    .map_err(query_err)?
                    .into_state()?,
            )),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &RelationshipState) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO relationship_states
                   (user_id, companion_id, stage, intimacy_level, message_count, last_interaction_at,
                    started_at, last_exchange_id, decayed_through, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id, companion_id) DO UPDATE SET
                   stage = excluded.stage,
                   intimacy_level = excluded.intimacy_level,
                   message_count = excluded.message_count,
                   last_interaction_at = excluded.last_interaction_at,
                   last_exchange_id = excluded.last_exchange_id,
                   decayed_through = excluded.decayed_through,
                   updated_at = excluded.updated_at"#,
        )
        .bind(state.user_id.to_string())
        .bind(state.companion_id.to_string())
        .bind(&state.stage)
        .bind(i64::from(state.intimacy_level))
        .bind(i64::from(state.message_count))
        .bind(state.last_interaction_at.as_ref().map(format_datetime))
        .bind(format_datetime(&state.started_at))
        .bind(state.last_exchange_id.map(|id| id.to_string()))
        .bind(state.decayed_through.as_ref().map(format_datetime))
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("relational.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::relational(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repo = SqliteRelationshipRepository::new(test_pool().await);
        let now = Utc::now();
        let mut state = RelationshipState::initial(Uuid::now_v7(), Uuid::now_v7(), "acquaintance", now);
        state.intimacy_level = 12;
        state.message_count = 9;
        state.stage = "friend".to_string();
        state.last_interaction_at = Some(now);
        state.last_exchange_id = Some(Uuid::now_v7());

        repo.save(&state).await.unwrap();
        let loaded = repo
            .get(&state.user_id, &state.companion_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_upserts_the_pair() {
        let repo = SqliteRelationshipRepository::new(test_pool().await);
        let mut state =
            RelationshipState::initial(Uuid::now_v7(), Uuid::now_v7(), "acquaintance", Utc::now());
        repo.save(&state).await.unwrap();

        state.intimacy_level = 3;
        state.message_count = 3;
        repo.save(&state).await.unwrap();

        let loaded = repo
            .get(&state.user_id, &state.companion_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.intimacy_level, 3);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relationship_states")
            .fetch_one(&repo.pool.reader)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_missing_pair_is_none() {
        let repo = SqliteRelationshipRepository::new(test_pool().await);
        assert!(
            repo.get(&Uuid::now_v7(), &Uuid::now_v7())
                .await
                .unwrap()
                .is_none()
        );
    }
}

//! SQLite engagement repository implementation.
//!
//! Engagement records keep their maps and trend windows as JSON columns.
//! `commit_exchange` claims the exchange in `processed_exchanges` and writes
//! the record and its milestones in one transaction, so a replayed exchange
//! is never counted twice.

use std::collections::BTreeMap;

use kindred_core::analytics::repository::EngagementRepository;
use kindred_types::engagement::{EngagementRecord, Milestone, MilestoneKind, SentimentPoint};
use kindred_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_count, parse_datetime, parse_uuid, query_err};

/// SQLite-backed implementation of `EngagementRepository`.
pub struct SqliteEngagementRepository {
    pool: DatabasePool,
}

impl SqliteEngagementRepository {
    /// Create a new repository backed by the given relational pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct EngagementRow {
    user_id: String,
    companion_id: String,
    conversation_id: String,
    exchange_count: i64,
    session_count: i64,
    total_session_secs: i64,
    current_session_started_at: Option<String>,
    last_exchange_at: Option<String>,
    messages_per_session: f64,
    avg_response_ms: f64,
    engagement_score: f64,
    depth_score: f64,
    emotional_intensity: f64,
    topic_diversity: f64,
    vulnerability_score: f64,
    topic_counts: String,
    preferred_topics: String,
    sentiment_trend: String,
    milestone_progress: f64,
    updated_at: String,
}

impl EngagementRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            companion_id: row.try_get("companion_id")?,
            conversation_id: row.try_get("conversation_id")?,
            exchange_count: row.try_get("exchange_count")?,
            session_count: row.try_get("session_count")?,
            total_session_secs: row.try_get("total_session_secs")?,
            current_session_started_at: row.try_get("current_session_started_at")?,
            last_exchange_at: row.try_get("last_exchange_at")?,
            messages_per_session: row.try_get("messages_per_session")?,
            avg_response_ms: row.try_get("avg_response_ms")?,
            engagement_score: row.try_get("engagement_score")?,
            depth_score: row.try_get("depth_score")?,
            emotional_intensity: row.try_get("emotional_intensity")?,
            topic_diversity: row.try_get("topic_diversity")?,
            vulnerability_score: row.try_get("vulnerability_score")?,
            topic_counts: row.try_get("topic_counts")?,
            preferred_topics: row.try_get("preferred_topics")?,
            sentiment_trend: row.try_get("sentiment_trend")?,
            milestone_progress: row.try_get("milestone_progress")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<EngagementRecord, RepositoryError> {
        let topic_counts: BTreeMap<String, u32> = decode_json(&self.topic_counts, "topic_counts")?;
        let preferred_topics: Vec<String> = decode_json(&self.preferred_topics, "preferred_topics")?;
        let sentiment_trend: Vec<SentimentPoint> =
            decode_json(&self.sentiment_trend, "sentiment_trend")?;

        Ok(EngagementRecord {
            user_id: parse_uuid(&self.user_id, "user_id")?,
            companion_id: parse_uuid(&self.companion_id, "companion_id")?,
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id")?,
            exchange_count: parse_count(self.exchange_count, "exchange_count")?,
            session_count: parse_count(self.session_count, "session_count")?,
            total_session_secs: self.total_session_secs,
            current_session_started_at: self
                .current_session_started_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            last_exchange_at: self
                .last_exchange_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            messages_per_session: self.messages_per_session,
            avg_response_ms: self.avg_response_ms,
            engagement_score: self.engagement_score,
            depth_score: self.depth_score,
            emotional_intensity: self.emotional_intensity,
            topic_diversity: self.topic_diversity,
            vulnerability_score: self.vulnerability_score,
            topic_counts,
            preferred_topics,
            sentiment_trend,
            milestone_progress: self.milestone_progress,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MilestoneRow {
    id: String,
    user_id: String,
    companion_id: String,
    conversation_id: Option<String>,
    exchange_id: Option<String>,
    kind: String,
    from_stage: Option<String>,
    to_stage: Option<String>,
    intimacy_level: i64,
    achieved_at: String,
}

impl MilestoneRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            companion_id: row.try_get("companion_id")?,
            conversation_id: row.try_get("conversation_id")?,
            exchange_id: row.try_get("exchange_id")?,
            kind: row.try_get("kind")?,
            from_stage: row.try_get("from_stage")?,
            to_stage: row.try_get("to_stage")?,
            intimacy_level: row.try_get("intimacy_level")?,
            achieved_at: row.try_get("achieved_at")?,
        })
    }

    fn into_milestone(self) -> Result<Milestone, RepositoryError> {
        let kind: MilestoneKind = self.kind.parse().map_err(RepositoryError::Query)?;
        Ok(Milestone {
            id: parse_uuid(&self.id, "milestone id")?,
            user_id: parse_uuid(&self.user_id, "user_id")?,
            companion_id: parse_uuid(&self.companion_id, "companion_id")?,
            conversation_id: self
                .conversation_id
                .as_deref()
                .map(|id| parse_uuid(id, "conversation_id"))
                .transpose()?,
            exchange_id: self
                .exchange_id
                .as_deref()
                .map(|id| parse_uuid(id, "exchange_id"))
                .transpose()?,
            kind,
            from_stage: self.from_stage,
            to_stage: self.to_stage,
            intimacy_level: parse_count(self.intimacy_level, "intimacy_level")?,
            achieved_at: parse_datetime(&self.achieved_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Query(format!("invalid {column}: {e}")))
}

fn encode_json<T: serde::Serialize>(value: &T, column: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Query(format!("failed to encode {column}: {e}")))
}

async fn insert_milestone<'e, E>(executor: E, milestone: &Milestone) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"INSERT INTO milestones
               (id, user_id, companion_id, conversation_id, exchange_id, kind, from_stage, to_stage, intimacy_level, achieved_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(milestone.id.to_string())
    .bind(milestone.user_id.to_string())
    .bind(milestone.companion_id.to_string())
    .bind(milestone.conversation_id.map(|id| id.to_string()))
    .bind(milestone.exchange_id.map(|id| id.to_string()))
    .bind(milestone.kind.to_string())
    .bind(&milestone.from_stage)
    .bind(&milestone.to_stage)
    .bind(i64::from(milestone.intimacy_level))
    .bind(format_datetime(&milestone.achieved_at))
    .execute(executor)
    .await
    .map_err(query_err)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// EngagementRepository implementation
// ---------------------------------------------------------------------------

impl EngagementRepository for SqliteEngagementRepository {
    async fn get_record(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<EngagementRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM engagement_records WHERE conversation_id = ?")
            .bind(conversation_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                EngagementRow::from_row(&row)
                    .map_err(query_err)?
                    .into_record()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_records(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM engagement_records
               WHERE user_id = ? AND companion_id = ?
               ORDER BY updated_at ASC"#,
        )
        .bind(user_id.to_string())
        .bind(companion_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| EngagementRow::from_row(row).map_err(query_err)?.into_record())
            .collect()
    }

    async fn is_recorded(&self, exchange_id: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 AS hit FROM processed_exchanges WHERE exchange_id = ?")
            .bind(exchange_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        Ok(row.is_some())
    }

    async fn commit_exchange(
        &self,
        exchange_id: &Uuid,
        record: &EngagementRecord,
        milestones: &[Milestone],
    ) -> Result<bool, RepositoryError> {
        let topic_counts = encode_json(&record.topic_counts, "topic_counts")?;
        let preferred_topics = encode_json(&record.preferred_topics, "preferred_topics")?;
        let sentiment_trend = encode_json(&record.sentiment_trend, "sentiment_trend")?;

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let claimed = sqlx::query(
            r#"INSERT OR IGNORE INTO processed_exchanges (exchange_id, conversation_id, processed_at)
               VALUES (?, ?, ?)"#,
        )
        .bind(exchange_id.to_string())
        .bind(record.conversation_id.to_string())
        .bind(format_datetime(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(query_err)?;
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO engagement_records
                   (conversation_id, user_id, companion_id, exchange_count, session_count, total_session_secs,
                    current_session_started_at, last_exchange_at, messages_per_session, avg_response_ms,
                    engagement_score, depth_score, emotional_intensity, topic_diversity, vulnerability_score,
                    topic_counts, preferred_topics, sentiment_trend, milestone_progress, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (conversation_id) DO UPDATE SET
                   exchange_count = excluded.exchange_count,
                   session_count = excluded.session_count,
                   total_session_secs = excluded.total_session_secs,
                   current_session_started_at = excluded.current_session_started_at,
                   last_exchange_at = excluded.last_exchange_at,
                   messages_per_session = excluded.messages_per_session,
                   avg_response_ms = excluded.avg_response_ms,
                   engagement_score = excluded.engagement_score,
                   depth_score = excluded.depth_score,
                   emotional_intensity = excluded.emotional_intensity,
                   topic_diversity = excluded.topic_diversity,
                   vulnerability_score = excluded.vulnerability_score,
                   topic_counts = excluded.topic_counts,
                   preferred_topics = excluded.preferred_topics,
                   sentiment_trend = excluded.sentiment_trend,
                   milestone_progress = excluded.milestone_progress,
                   updated_at = excluded.updated_at"#,
        )
        .bind(record.conversation_id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.companion_id.to_string())
        .bind(i64::from(record.exchange_count))
        .bind(i64::from(record.session_count))
        .bind(record.total_session_secs)
        .bind(record.current_session_started_at.as_ref().map(format_datetime))
        .bind(record.last_exchange_at.as_ref().map(format_datetime))
        .bind(record.messages_per_session)
        .bind(record.avg_response_ms)
        .bind(record.engagement_score)
        .bind(record.depth_score)
        .bind(record.emotional_intensity)
        .bind(record.topic_diversity)
        .bind(record.vulnerability_score)
        .bind(&topic_counts)
        .bind(&preferred_topics)
        .bind(&sentiment_trend)
        .bind(record.milestone_progress)
        .bind(format_datetime(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        for milestone in milestones {
            insert_milestone(&mut *tx, milestone).await?;
        }

        tx.commit().await.map_err(query_err)?;

        Ok(true)
    }

    async fn record_milestone(&self, milestone: &Milestone) -> Result<(), RepositoryError> {
        insert_milestone(&self.pool.writer, milestone).await
    }

    async fn list_milestones(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> Result<Vec<Milestone>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM milestones
               WHERE user_id = ? AND companion_id = ?
               ORDER BY achieved_at ASC"#,
        )
        .bind(user_id.to_string())
        .bind(companion_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| MilestoneRow::from_row(row).map_err(query_err)?.into_milestone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kindred_types::chat::SentimentLabel;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("relational.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::relational(&url).await.unwrap()
    }

    fn record() -> EngagementRecord {
        let now = Utc::now();
        let mut record = EngagementRecord::empty(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), now);
        record.exchange_count = 1;
        record.session_count = 1;
        record.current_session_started_at = Some(now);
        record.last_exchange_at = Some(now);
        record.avg_response_ms = 850.0;
        record.topic_counts.insert("music".to_string(), 2);
        record.preferred_topics = vec!["music".to_string()];
        record.sentiment_trend.push(SentimentPoint {
            at: now,
            tone: SentimentLabel::Positive,
            score: 0.5,
        });
        record
    }

    fn milestone(record: &EngagementRecord, kind: MilestoneKind) -> Milestone {
        Milestone {
            id: Uuid::now_v7(),
            user_id: record.user_id,
            companion_id: record.companion_id,
            conversation_id: Some(record.conversation_id),
            exchange_id: None,
            kind,
            from_stage: None,
            to_stage: Some("acquaintance".to_string()),
            intimacy_level: 1,
            achieved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_exchange_round_trip() {
        let repo = SqliteEngagementRepository::new(test_pool().await);
        let record = record();
        let exchange = Uuid::now_v7();
        let first = milestone(&record, MilestoneKind::FirstExchange);

        assert!(!repo.is_recorded(&exchange).await.unwrap());
        assert!(
            repo.commit_exchange(&exchange, &record, std::slice::from_ref(&first))
                .await
                .unwrap()
        );
        assert!(repo.is_recorded(&exchange).await.unwrap());

        let loaded = repo.get_record(&record.conversation_id).await.unwrap().unwrap();
        assert_eq!(loaded, record);

        let milestones = repo
            .list_milestones(&record.user_id, &record.companion_id)
            .await
            .unwrap();
        assert_eq!(milestones, vec![first]);
    }

    #[tokio::test]
    async fn test_replayed_exchange_writes_nothing() {
        let repo = SqliteEngagementRepository::new(test_pool().await);
        let mut record = record();
        let exchange = Uuid::now_v7();
        assert!(repo.commit_exchange(&exchange, &record, &[]).await.unwrap());

        record.exchange_count = 99;
        let again = repo
            .commit_exchange(&exchange, &record, &[milestone(&record, MilestoneKind::StageReached)])
            .await
            .unwrap();
        assert!(!again);

        let loaded = repo.get_record(&record.conversation_id).await.unwrap().unwrap();
        assert_eq!(loaded.exchange_count, 1);
        assert!(
            repo.list_milestones(&record.user_id, &record.companion_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_list_records_for_pair() {
        let repo = SqliteEngagementRepository::new(test_pool().await);
        let first = record();
        let mut second = EngagementRecord::empty(first.user_id, first.companion_id, Uuid::now_v7(), Utc::now());
        second.exchange_count = 4;
        let stranger = record();

        repo.commit_exchange(&Uuid::now_v7(), &first, &[]).await.unwrap();
        repo.commit_exchange(&Uuid::now_v7(), &second, &[]).await.unwrap();
        repo.commit_exchange(&Uuid::now_v7(), &stranger, &[]).await.unwrap();

        let records = repo
            .list_records(&first.user_id, &first.companion_id)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().map(|r| r.exchange_count).sum::<u32>(), 5);
    }

    #[tokio::test]
    async fn test_record_milestone_outside_exchange() {
        let repo = SqliteEngagementRepository::new(test_pool().await);
        let record = record();
        let mut lost = milestone(&record, MilestoneKind::StageLost);
        lost.conversation_id = None;
        lost.from_stage = Some("friend".to_string());

        repo.record_milestone(&lost).await.unwrap();

        let milestones = repo
            .list_milestones(&record.user_id, &record.companion_id)
            .await
            .unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].kind, MilestoneKind::StageLost);
        assert_eq!(milestones[0].conversation_id, None);
    }
}

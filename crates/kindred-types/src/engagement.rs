//! Engagement analytics types.
//!
//! An `EngagementRecord` is the running roll-up for one conversation. Scores
//! are kept in `[0.0, 1.0]`; the sentiment trend is a bounded window of the
//! most recent user-message sentiments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::chat::{Message, SentimentLabel};
use crate::relationship::StageTransition;

/// One point of the sentiment trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub at: DateTime<Utc>,
    pub tone: SentimentLabel,
    pub score: f32,
}

/// Running engagement aggregates for one (user, companion, conversation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub conversation_id: Uuid,
    pub exchange_count: u32,
    pub session_count: u32,
    /// Sum of all closed and open session lengths.
    pub total_session_secs: i64,
    pub current_session_started_at: Option<DateTime<Utc>>,
    pub last_exchange_at: Option<DateTime<Utc>>,
    pub messages_per_session: f64,
    /// Mean time between a user message and the companion reply.
    pub avg_response_ms: f64,
    pub engagement_score: f64,
    pub depth_score: f64,
    pub emotional_intensity: f64,
    pub topic_diversity: f64,
    pub vulnerability_score: f64,
    pub topic_counts: BTreeMap<String, u32>,
    pub preferred_topics: Vec<String>,
    pub sentiment_trend: Vec<SentimentPoint>,
    /// Progress toward the next relationship stage, `[0.0, 1.0]`.
    pub milestone_progress: f64,
    pub updated_at: DateTime<Utc>,
}

impl EngagementRecord {
    pub fn empty(user_id: Uuid, companion_id: Uuid, conversation_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            companion_id,
            conversation_id,
            exchange_count: 0,
            session_count: 0,
            total_session_secs: 0,
            current_session_started_at: None,
            last_exchange_at: None,
            messages_per_session: 0.0,
            avg_response_ms: 0.0,
            engagement_score: 0.0,
            depth_score: 0.0,
            emotional_intensity: 0.0,
            topic_diversity: 0.0,
            vulnerability_score: 0.0,
            topic_counts: BTreeMap::new(),
            preferred_topics: Vec::new(),
            sentiment_trend: Vec::new(),
            milestone_progress: 0.0,
            updated_at: now,
        }
    }
}

/// Kind of milestone recorded for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    StageReached,
    StageLost,
    FirstExchange,
}

impl fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MilestoneKind::StageReached => write!(f, "stage_reached"),
            MilestoneKind::StageLost => write!(f, "stage_lost"),
            MilestoneKind::FirstExchange => write!(f, "first_exchange"),
        }
    }
}

impl FromStr for MilestoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage_reached" => Ok(MilestoneKind::StageReached),
            "stage_lost" => Ok(MilestoneKind::StageLost),
            "first_exchange" => Ok(MilestoneKind::FirstExchange),
            other => Err(format!("invalid milestone kind: '{other}'")),
        }
    }
}

/// A notable relationship event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub conversation_id: Option<Uuid>,
    /// Exchange that triggered the milestone, if any.
    pub exchange_id: Option<Uuid>,
    pub kind: MilestoneKind,
    pub from_stage: Option<String>,
    pub to_stage: Option<String>,
    pub intimacy_level: u32,
    pub achieved_at: DateTime<Utc>,
}

/// A completed exchange handed to the analytics aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Idempotency key; the companion reply's message id.
    pub id: Uuid,
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub conversation_id: Uuid,
    pub user_message: Message,
    pub companion_message: Message,
    pub transition: Option<StageTransition>,
    pub intimacy_level: u32,
    /// Progress toward the next stage after this exchange.
    pub stage_progress: f64,
}

/// Direction of the sentiment trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

/// Cross-conversation engagement summary for a (user, companion) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementAnalysis {
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub conversations: u32,
    pub exchanges: u32,
    pub sessions: u32,
    pub messages_per_session: f64,
    pub avg_response_ms: f64,
    pub engagement_score: f64,
    pub depth_score: f64,
    pub emotional_intensity: f64,
    pub topic_diversity: f64,
    pub vulnerability_score: f64,
    pub preferred_topics: Vec<String>,
    pub trend: TrendDirection,
    pub strongest_dimension: Option<String>,
    pub weakest_dimension: Option<String>,
    pub milestones: Vec<Milestone>,
}

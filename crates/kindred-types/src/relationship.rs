//! Relationship state between a user and a companion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Progression state for one (user, companion) pair.
///
/// `stage` is always derived from `intimacy_level` and `message_count` by
/// the progression engine; nothing else writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub stage: String,
    pub intimacy_level: u32,
    /// Completed exchanges (one user message plus one reply).
    pub message_count: u32,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    /// Exchange most recently applied, used to skip replays.
    pub last_exchange_id: Option<Uuid>,
    /// Idle time up to this instant has already been decayed.
    pub decayed_through: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RelationshipState {
    /// A fresh relationship at the given initial stage.
    pub fn initial(user_id: Uuid, companion_id: Uuid, stage: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            companion_id,
            stage: stage.to_string(),
            intimacy_level: 0,
            message_count: 0,
            last_interaction_at: None,
            started_at: now,
            last_exchange_id: None,
            decayed_through: None,
            updated_at: now,
        }
    }
}

/// What caused a stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Exchange,
    Decay,
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionCause::Exchange => write!(f, "exchange"),
            TransitionCause::Decay => write!(f, "decay"),
        }
    }
}

/// Emitted whenever a relationship changes stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub user_id: Uuid,
    pub companion_id: Uuid,
    pub previous_stage: String,
    pub new_stage: String,
    pub intimacy_level: u32,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}

/// Outcome of applying an exchange or a decay to a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    pub state: RelationshipState,
    /// Intimacy actually gained (or lost, for decay) by this update.
    pub intimacy_delta: i64,
    pub transition: Option<StageTransition>,
    /// True when the exchange had already been applied and nothing changed.
    pub replayed: bool,
}

/// Where a relationship stands relative to the next stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    pub current_stage: String,
    pub next_stage: Option<String>,
    pub intimacy_needed: u32,
    pub messages_needed: u32,
    /// Fraction of the way from the current to the next stage, `1.0` at the top.
    pub progress: f64,
}

//! Engagement aggregation.
//!
//! `fold_exchange` is the pure running roll-up of one exchange into a
//! conversation's record. `EngagementAggregator` wraps it with the
//! processed-exchange ledger so replays leave the aggregates untouched, and
//! `summarize` rolls a pair's records up into an `EngagementAnalysis`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use kindred_types::config::AnalyticsConfig;
use kindred_types::engagement::{
    EngagementAnalysis, EngagementRecord, Exchange, Milestone, MilestoneKind, SentimentPoint,
    TrendDirection,
};
use kindred_types::error::PipelineError;
use kindred_types::relationship::{StageTransition, TransitionCause};
use tracing::debug;
use uuid::Uuid;

use super::repository::EngagementRepository;
use super::topics::TopicDetector;

/// Characters of user text that count as a fully "deep" message.
const DEPTH_FULL_CHARS: f64 = 280.0;
/// Messages per session that count as fully engaged.
const ENGAGED_MESSAGES_PER_SESSION: f64 = 20.0;
/// Mean sentiment shift between trend halves that counts as a direction.
const TREND_EPSILON: f64 = 0.1;

pub struct EngagementAggregator<R: EngagementRepository> {
    repo: R,
    config: AnalyticsConfig,
    topics: TopicDetector,
}

impl<R: EngagementRepository> EngagementAggregator<R> {
    pub fn new(repo: R, config: AnalyticsConfig) -> Self {
        let topics = TopicDetector::new(&config.topics);
        Self {
            repo,
            config,
            topics,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn topics(&self) -> &TopicDetector {
        &self.topics
    }

    /// Fold a completed exchange into its conversation's record.
    ///
    /// Idempotent per exchange id: returns `false` and changes nothing if the
    /// exchange was already recorded.
    pub async fn record_exchange(&self, exchange: &Exchange) -> Result<bool, PipelineError> {
        if self.repo.is_recorded(&exchange.id).await? {
            debug!(exchange_id = %exchange.id, "exchange already recorded");
            return Ok(false);
        }

        let existing = self.repo.get_record(&exchange.conversation_id).await?;
        let is_new = existing.is_none();
        let record = existing.unwrap_or_else(|| {
            EngagementRecord::empty(
                exchange.user_id,
                exchange.companion_id,
                exchange.conversation_id,
                exchange.user_message.created_at,
            )
        });

        let record = fold_exchange(record, exchange, &self.config, &self.topics);
        let milestones = exchange_milestones(exchange, is_new);

        let applied = self
            .repo
            .commit_exchange(&exchange.id, &record, &milestones)
            .await?;
        if applied {
            debug!(
                conversation_id = %exchange.conversation_id,
                exchanges = record.exchange_count,
                engagement = record.engagement_score,
                "engagement recorded"
            );
        }
        Ok(applied)
    }

    /// Record a milestone for a transition that happened outside an exchange.
    pub async fn record_transition(&self, transition: &StageTransition) -> Result<Milestone, PipelineError> {
        let milestone = transition_milestone(transition, None, None);
        self.repo.record_milestone(&milestone).await?;
        Ok(milestone)
    }

    /// Roll up every conversation of a pair.
    pub async fn analyze(&self, user_id: Uuid, companion_id: Uuid) -> Result<EngagementAnalysis, PipelineError> {
        let records = self.repo.list_records(&user_id, &companion_id).await?;
        let milestones = self.repo.list_milestones(&user_id, &companion_id).await?;
        Ok(summarize(
            user_id,
            companion_id,
            &records,
            milestones,
            &self.config,
            self.topics.topic_count(),
        ))
    }
}

/// Apply one exchange to a record.
pub fn fold_exchange(
    mut record: EngagementRecord,
    exchange: &Exchange,
    config: &AnalyticsConfig,
    topics: &TopicDetector,
) -> EngagementRecord {
    let user_at = exchange.user_message.created_at;
    let reply_at = exchange.companion_message.created_at;
    let gap = Duration::minutes(config.session_gap_minutes.max(0));

    match record.last_exchange_at {
        Some(last) if user_at - last <= gap => {
            record.total_session_secs += (reply_at - last).num_seconds().max(0);
        }
        _ => {
            record.session_count += 1;
            record.current_session_started_at = Some(user_at);
            record.total_session_secs += (reply_at - user_at).num_seconds().max(0);
        }
    }

    record.exchange_count += 1;
    let n = f64::from(record.exchange_count);
    record.messages_per_session =
        f64::from(record.exchange_count * 2) / f64::from(record.session_count.max(1));

    let user_text = exchange.user_message.payload.render();
    let response_ms = (reply_at - user_at).num_milliseconds().max(0) as f64;
    let depth = (user_text.chars().count() as f64 / DEPTH_FULL_CHARS).min(1.0);
    let sentiment = exchange.user_message.sentiment;
    let emotional = f64::from(sentiment.score.abs()).min(1.0);
    let lowered = user_text.to_lowercase();
    let vulnerable = if config
        .vulnerability_markers
        .iter()
        .any(|m| lowered.contains(&m.to_lowercase()))
    {
        1.0
    } else {
        0.0
    };

    record.avg_response_ms = running_mean(record.avg_response_ms, response_ms, n);
    record.depth_score = running_mean(record.depth_score, depth, n);
    record.emotional_intensity = running_mean(record.emotional_intensity, emotional, n);
    record.vulnerability_score = running_mean(record.vulnerability_score, vulnerable, n);

    for topic in topics.detect(&user_text) {
        *record.topic_counts.entry(topic).or_insert(0) += 1;
    }
    record.topic_diversity = diversity(record.topic_counts.len(), topics.topic_count());
    record.preferred_topics = top_topics(&record.topic_counts, config.preferred_topic_count);

    record.sentiment_trend.push(SentimentPoint {
        at: user_at,
        tone: sentiment.label,
        score: sentiment.score,
    });
    let overflow = record
        .sentiment_trend
        .len()
        .saturating_sub(config.sentiment_window);
    record.sentiment_trend.drain(..overflow);

    record.engagement_score = engagement_score(
        record.messages_per_session,
        record.depth_score,
        record.emotional_intensity,
    );
    record.milestone_progress = exchange.stage_progress.clamp(0.0, 1.0);
    record.last_exchange_at = Some(reply_at);
    record.updated_at = reply_at;
    record
}

/// Milestones produced by an exchange.
pub fn exchange_milestones(exchange: &Exchange, first_in_conversation: bool) -> Vec<Milestone> {
    let mut milestones = Vec::new();
    let at = exchange.companion_message.created_at;

    if first_in_conversation {
        milestones.push(Milestone {
            id: Uuid::now_v7(),
            user_id: exchange.user_id,
            companion_id: exchange.companion_id,
            conversation_id: Some(exchange.conversation_id),
            exchange_id: Some(exchange.id),
            kind: MilestoneKind::FirstExchange,
            from_stage: None,
            to_stage: None,
            intimacy_level: exchange.intimacy_level,
            achieved_at: at,
        });
    }
    if let Some(transition) = &exchange.transition {
        milestones.push(transition_milestone(
            transition,
            Some(exchange.conversation_id),
            Some(exchange.id),
        ));
    }
    milestones
}

fn transition_milestone(
    transition: &StageTransition,
    conversation_id: Option<Uuid>,
    exchange_id: Option<Uuid>,
) -> Milestone {
    let kind = match transition.cause {
        TransitionCause::Exchange => MilestoneKind::StageReached,
        TransitionCause::Decay => MilestoneKind::StageLost,
    };
    Milestone {
        id: Uuid::now_v7(),
        user_id: transition.user_id,
        companion_id: transition.companion_id,
        conversation_id,
        exchange_id,
        kind,
        from_stage: Some(transition.previous_stage.clone()),
        to_stage: Some(transition.new_stage.clone()),
        intimacy_level: transition.intimacy_level,
        achieved_at: transition.at,
    }
}

/// Roll up a pair's records.
pub fn summarize(
    user_id: Uuid,
    companion_id: Uuid,
    records: &[EngagementRecord],
    milestones: Vec<Milestone>,
    config: &AnalyticsConfig,
    lexicon_size: usize,
) -> EngagementAnalysis {
    let exchanges: u32 = records.iter().map(|r| r.exchange_count).sum();
    let sessions: u32 = records.iter().map(|r| r.session_count).sum();

    let avg_response_ms = weighted_mean(records, exchanges, |r| r.avg_response_ms);
    let depth_score = weighted_mean(records, exchanges, |r| r.depth_score);
    let emotional_intensity = weighted_mean(records, exchanges, |r| r.emotional_intensity);
    let vulnerability_score = weighted_mean(records, exchanges, |r| r.vulnerability_score);

    let messages_per_session = if sessions == 0 {
        0.0
    } else {
        f64::from(exchanges * 2) / f64::from(sessions)
    };

    let mut topic_counts: BTreeMap<String, u32> = BTreeMap::new();
    for record in records {
        for (topic, count) in &record.topic_counts {
            *topic_counts.entry(topic.clone()).or_insert(0) += count;
        }
    }
    let topic_diversity = diversity(topic_counts.len(), lexicon_size);

    let mut trend: Vec<&SentimentPoint> = records.iter().flat_map(|r| &r.sentiment_trend).collect();
    trend.sort_by_key(|p| p.at);

    let (strongest_dimension, weakest_dimension) = if exchanges == 0 {
        (None, None)
    } else {
        let dims = [
            ("depth", depth_score),
            ("emotional_intensity", emotional_intensity),
            ("topic_diversity", topic_diversity),
            ("vulnerability", vulnerability_score),
        ];
        let strongest = dims
            .iter()
            .fold(dims[0], |best, d| if d.1 > best.1 { *d } else { best });
        let weakest = dims
            .iter()
            .fold(dims[0], |worst, d| if d.1 < worst.1 { *d } else { worst });
        (Some(strongest.0.to_string()), Some(weakest.0.to_string()))
    };

    EngagementAnalysis {
        user_id,
        companion_id,
        conversations: u32::try_from(records.len()).unwrap_or(u32::MAX),
        exchanges,
        sessions,
        messages_per_session,
        avg_response_ms,
        engagement_score: engagement_score(messages_per_session, depth_score, emotional_intensity),
        depth_score,
        emotional_intensity,
        topic_diversity,
        vulnerability_score,
        preferred_topics: top_topics(&topic_counts, config.preferred_topic_count),
        trend: trend_direction(&trend),
        strongest_dimension,
        weakest_dimension,
        milestones,
    }
}

/// Compare the mean score of the older half of the trend with the newer half.
pub fn trend_direction(points: &[&SentimentPoint]) -> TrendDirection {
    if points.len() < 2 {
        return TrendDirection::Stable;
    }
    let mid = points.len() / 2;
    let mean = |ps: &[&SentimentPoint]| {
        ps.iter().map(|p| f64::from(p.score)).sum::<f64>() / ps.len() as f64
    };
    let shift = mean(&points[mid..]) - mean(&points[..mid]);
    if shift > TREND_EPSILON {
        TrendDirection::Improving
    } else if shift < -TREND_EPSILON {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Most frequent tone in a record's sentiment trend, ties going to the newest.
pub fn dominant_tone(record: &EngagementRecord) -> Option<String> {
    let mut counts: BTreeMap<String, (usize, DateTime<Utc>)> = BTreeMap::new();
    for point in &record.sentiment_trend {
        let entry = counts.entry(point.tone.to_string()).or_insert((0, point.at));
        entry.0 += 1;
        entry.1 = entry.1.max(point.at);
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1))
        .map(|(tone, _)| tone)
}

/// Mean of a per-record score, weighted by each record's exchange count.
fn weighted_mean(
    records: &[EngagementRecord],
    exchanges: u32,
    score: impl Fn(&EngagementRecord) -> f64,
) -> f64 {
    if exchanges == 0 {
        return 0.0;
    }
    records
        .iter()
        .map(|r| score(r) * f64::from(r.exchange_count))
        .sum::<f64>()
        / f64::from(exchanges)
}

fn running_mean(mean: f64, value: f64, n: f64) -> f64 {
    mean + (value - mean) / n
}

fn diversity(distinct: usize, lexicon_size: usize) -> f64 {
    if lexicon_size == 0 {
        0.0
    } else {
        (distinct as f64 / lexicon_size as f64).min(1.0)
    }
}

fn engagement_score(messages_per_session: f64, depth: f64, emotional: f64) -> f64 {
    (0.5 * (messages_per_session / ENGAGED_MESSAGES_PER_SESSION).min(1.0)
        + 0.3 * depth
        + 0.2 * emotional)
        .clamp(0.0, 1.0)
}

/// Top `n` topics by count, ties broken by name.
fn top_topics(counts: &BTreeMap<String, u32>, n: usize) -> Vec<String> {
    let mut ranked: Vec<(&String, &u32)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(t, _)| t.clone()).collect()
}

/// Topics mentioned by any of the given texts.
pub fn mentioned_topics<'a>(
    topics: &TopicDetector,
    texts: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    texts.into_iter().flat_map(|t| topics.detect(t)).collect()
}

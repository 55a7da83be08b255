//! Read-only insight commands (insight, suggest, engagement, quality) and
//! relationship decay.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use kindred_types::engagement::TrendDirection;
use kindred_types::pipeline::TopicSuggestion;

use crate::state::AppState;

fn score_table(rows: &[(&str, f64)]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Dimension").fg(Color::White),
        Cell::new("Score").fg(Color::White),
    ]);
    for (name, score) in rows {
        let color = if *score >= 0.66 {
            Color::Green
        } else if *score >= 0.33 {
            Color::Yellow
        } else {
            Color::DarkGrey
        };
        table.add_row(vec![Cell::new(name), Cell::new(format!("{score:.2}")).fg(color)]);
    }
    table
}

fn print_suggestion(suggestion: &TopicSuggestion) {
    println!(
        "  {} Try talking about {}: {}",
        style("💡").bold(),
        style(&suggestion.topic).cyan().bold(),
        suggestion.prompt
    );
}

/// Everything known about one conversation.
///
/// # Examples
///
/// ```bash
/// kindred insight <conversation-id>
/// ```
pub async fn insight(state: &AppState, user_id: Uuid, conversation_id: Uuid, json: bool) -> Result<()> {
    let intel = state
        .pipeline
        .get_conversation_intelligence(user_id, conversation_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&intel)?);
        return Ok(());
    }

    println!();
    println!(
        "  Conversation {} ({} messages)",
        style(intel.conversation.id).cyan().bold(),
        intel.conversation.message_count
    );
    println!();

    match (&intel.relationship, &intel.stage_progress) {
        (Some(relationship), Some(progress)) => {
            println!(
                "  {} Stage {} · intimacy {} · {} exchanges",
                style("♥").red(),
                style(&relationship.stage).cyan(),
                relationship.intimacy_level,
                relationship.message_count
            );
            match &progress.next_stage {
                Some(next) => println!(
                    "    {:.0}% of the way to {} (needs {} intimacy, {} exchanges)",
                    progress.progress * 100.0,
                    style(next).cyan(),
                    progress.intimacy_needed,
                    progress.messages_needed
                ),
                None => println!("    Highest stage reached"),
            }
        }
        _ => println!("  {} No exchanges yet", style("i").blue().bold()),
    }

    if let Some(record) = &intel.engagement {
        println!();
        let table = score_table(&[
            ("engagement", record.engagement_score),
            ("depth", record.depth_score),
            ("emotional intensity", record.emotional_intensity),
            ("topic diversity", record.topic_diversity),
            ("vulnerability", record.vulnerability_score),
        ]);
        println!("{table}");
        if !record.preferred_topics.is_empty() {
            println!("  Favourite topics: {}", record.preferred_topics.join(", "));
        }
    }
    if let Some(tone) = &intel.dominant_tone {
        println!("  Dominant tone: {tone}");
    }
    if !intel.milestones.is_empty() {
        println!();
        for milestone in &intel.milestones {
            println!(
                "  {} {} {} {}",
                style("★").yellow(),
                milestone.achieved_at.format("%Y-%m-%d"),
                milestone.kind,
                milestone.to_stage.as_deref().unwrap_or_default()
            );
        }
    }
    println!();
    print_suggestion(&intel.suggested_topic);
    println!();

    Ok(())
}

pub async fn suggest(state: &AppState, user_id: Uuid, conversation_id: Uuid, json: bool) -> Result<()> {
    let suggestion = state
        .pipeline
        .suggest_next_topic(user_id, conversation_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestion)?);
    } else {
        println!();
        print_suggestion(&suggestion);
        println!();
    }

    Ok(())
}

/// Engagement roll-up across the pair's conversations.
pub async fn engagement(state: &AppState, user_id: Uuid, companion_id: Uuid, json: bool) -> Result<()> {
    let analysis = state
        .pipeline
        .analyze_engagement(user_id, companion_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    let trend = match analysis.trend {
        TrendDirection::Improving => style("improving").green(),
        TrendDirection::Stable => style("stable").white(),
        TrendDirection::Declining => style("declining").red(),
    };

    println!();
    println!(
        "  {} conversations · {} exchanges · {} sessions · mood {}",
        analysis.conversations, analysis.exchanges, analysis.sessions, trend
    );
    println!(
        "  {:.1} messages per session · {:.0} ms average reply",
        analysis.messages_per_session, analysis.avg_response_ms
    );
    println!();
    let table = score_table(&[
        ("engagement", analysis.engagement_score),
        ("depth", analysis.depth_score),
        ("emotional intensity", analysis.emotional_intensity),
        ("topic diversity", analysis.topic_diversity),
        ("vulnerability", analysis.vulnerability_score),
    ]);
    println!("{table}");
    if let (Some(strongest), Some(weakest)) = (&analysis.strongest_dimension, &analysis.weakest_dimension) {
        println!("  Strongest: {strongest} · weakest: {weakest}");
    }
    if !analysis.preferred_topics.is_empty() {
        println!("  Favourite topics: {}", analysis.preferred_topics.join(", "));
    }
    println!();

    Ok(())
}

pub async fn quality(state: &AppState, user_id: Uuid, message_id: Uuid, json: bool) -> Result<()> {
    let quality = state
        .pipeline
        .get_response_quality(user_id, message_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&quality)?);
        return Ok(());
    }

    let score = quality
        .quality_score
        .map(|q| format!("{q:.2}"))
        .unwrap_or_else(|| "not scored".to_string());
    println!();
    println!("  Quality   {}", style(score).cyan());
    println!(
        "  Sentiment {} ({:+.2})",
        quality.sentiment.label, quality.sentiment.score
    );
    println!("  Tokens    {}", quality.token_count);
    println!();

    Ok(())
}

/// Apply idle decay to the user's relationship with a companion.
pub async fn decay(
    state: &AppState,
    user_id: Uuid,
    companion_id: Uuid,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let update = state
        .pipeline
        .apply_decay(user_id, companion_id, at.unwrap_or_else(Utc::now))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&update)?);
        return Ok(());
    }

    println!();
    if update.intimacy_delta == 0 {
        println!("  {} Nothing to decay", style("i").blue().bold());
    } else {
        println!(
            "  {} Intimacy {} → {}",
            style("↓").red(),
            i64::from(update.state.intimacy_level) - update.intimacy_delta,
            update.state.intimacy_level
        );
    }
    if let Some(t) = &update.transition {
        println!(
            "  {} Stage dropped from {} to {}",
            style("✗").red().bold(),
            t.previous_stage,
            style(&t.new_stage).cyan()
        );
    }
    println!();

    Ok(())
}

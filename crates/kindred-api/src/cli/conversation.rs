//! Conversation lifecycle commands: start, list, archive, reactivate.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use kindred_types::chat::Conversation;

use crate::state::AppState;

/// Open the active conversation with a companion, creating it if needed.
///
/// # Examples
///
/// ```bash
/// kindred start <companion-id>
/// ```
pub async fn start(state: &AppState, user_id: Uuid, companion_id: Uuid, json: bool) -> Result<()> {
    let conversation = state
        .pipeline
        .start_conversation(user_id, companion_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Conversation {}",
        style("✓").green().bold(),
        style(conversation.id).cyan()
    );
    if conversation.message_count > 0 {
        println!(
            "  {} {} messages so far",
            style("i").blue().bold(),
            conversation.message_count
        );
    }
    println!(
        "  Say hi with: {}",
        style(format!("kindred send {} \"Hi\"", conversation.id)).yellow()
    );
    println!();

    Ok(())
}

/// List the user's conversations, most recently active first.
pub async fn list(state: &AppState, user_id: Uuid, include_archived: bool, json: bool) -> Result<()> {
    let conversations = state
        .pipeline
        .list_conversations(user_id, include_archived)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style("kindred start <companion-id>").yellow()
        );
        println!(
            "  Companion personas live in {}",
            style(state.data_dir.join("companions").display()).dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Conversation").fg(Color::White),
        Cell::new("Companion").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Last active").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for conversation in &conversations {
        let last_active = conversation
            .last_activity_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let status = if conversation.archived {
            Cell::new("archived").fg(Color::DarkGrey)
        } else {
            Cell::new("active").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(conversation.id).fg(Color::Cyan),
            Cell::new(conversation.companion_id).fg(Color::White),
            Cell::new(conversation.message_count).fg(Color::White),
            Cell::new(last_active).fg(Color::DarkGrey),
            status,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

pub async fn archive(state: &AppState, user_id: Uuid, conversation_id: Uuid, json: bool) -> Result<()> {
    let conversation = state
        .pipeline
        .archive_conversation(user_id, conversation_id)
        .await?;
    print_status(&conversation, "archived", json)
}

pub async fn reactivate(state: &AppState, user_id: Uuid, conversation_id: Uuid, json: bool) -> Result<()> {
    let conversation = state
        .pipeline
        .reactivate_conversation(user_id, conversation_id)
        .await?;
    print_status(&conversation, "reactivated", json)
}

fn print_status(conversation: &Conversation, verb: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(conversation)?);
    } else {
        println!();
        println!(
            "  {} Conversation {} {verb}",
            style("✓").green().bold(),
            style(conversation.id).cyan()
        );
        println!();
    }
    Ok(())
}

//! Messaging commands: send, retry, history, read.
//!
//! `send` and `retry` can be interrupted with Ctrl+C; the pending reply is
//! cancelled and nothing further is written.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use kindred_types::chat::{Message, SenderKind, SentimentLabel};
use kindred_types::pipeline::{ReplyFailure, ReplyOutcome, SendMessageRequest, SendOutcome};

use super::{PayloadArgs, truncate};
use crate::state::AppState;

/// Cancel the token when the user presses Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

/// Send a message and print the companion's reply.
///
/// # Examples
///
/// ```bash
/// kindred send <conversation-id> "How was your day?"
/// kindred send <conversation-id> --photo media/sunset.jpg
/// ```
pub async fn send(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
    payload: PayloadArgs,
    json: bool,
) -> Result<()> {
    state.ensure_model()?;

    let request = SendMessageRequest {
        user_id,
        conversation_id,
        payload: payload.into_payload(),
    };
    let outcome = state
        .pipeline
        .send_message(request, cancel_on_ctrl_c())
        .await?;

    print_outcome(&outcome, json)
}

/// Regenerate the reply to the newest unanswered user message.
pub async fn retry(state: &AppState, user_id: Uuid, conversation_id: Uuid, json: bool) -> Result<()> {
    state.ensure_model()?;

    let outcome = state
        .pipeline
        .retry_reply(user_id, conversation_id, cancel_on_ctrl_c())
        .await?;

    print_outcome(&outcome, json)
}

fn print_outcome(outcome: &SendOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!();
    match &outcome.reply {
        ReplyOutcome::Delivered {
            message,
            relationship,
            transition,
        } => {
            println!("  {} {}", style("companion ›").magenta().bold(), message.payload.render());
            println!();
            println!(
                "  {} stage {} · intimacy {} · {} exchanges",
                style("♥").red(),
                style(&relationship.stage).cyan(),
                relationship.intimacy_level,
                relationship.message_count
            );
            if let Some(t) = transition {
                println!(
                    "  {} You are now {} (was {})",
                    style("★").yellow().bold(),
                    style(&t.new_stage).cyan().bold(),
                    t.previous_stage
                );
            }
        }
        ReplyOutcome::Failed(failure) => {
            let (reason, hint) = match failure {
                ReplyFailure::ProviderUnavailable { reason } => {
                    (reason, "Your message was saved. Try again with `kindred retry`.")
                }
                ReplyFailure::ProviderRejected { reason } => {
                    (reason, "Your message was saved, but the companion could not answer it.")
                }
                ReplyFailure::ReplyNotStored { reason } => {
                    (reason, "Your message was saved, but the reply was lost. Try `kindred retry`.")
                }
            };
            println!("  {} No reply: {reason}", style("✗").red().bold());
            println!("  {}", style(hint).dim());
        }
    }
    println!();

    Ok(())
}

/// Print one page of a conversation.
///
/// # Examples
///
/// ```bash
/// kindred history <conversation-id> --limit 50
/// kindred history <conversation-id> --cursor <next-cursor>
/// ```
pub async fn history(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
    cursor: Option<&str>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let page = state
        .pipeline
        .list_messages(user_id, conversation_id, cursor, limit)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.messages.is_empty() {
        println!();
        println!("  {} No messages.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("Message").fg(Color::White),
        Cell::new("Tone").fg(Color::White),
        Cell::new("").fg(Color::White),
    ]);

    for message in &page.messages {
        table.add_row(message_row(message));
    }

    println!();
    println!("{table}");
    if let Some(next) = &page.next_cursor {
        println!();
        println!(
            "  More: {}",
            style(format!("kindred history {conversation_id} --cursor {next}")).yellow()
        );
    }
    println!();

    Ok(())
}

fn message_row(message: &Message) -> Vec<Cell> {
    let from = match message.sender {
        SenderKind::User => Cell::new("you").fg(Color::Cyan),
        SenderKind::Companion => Cell::new("companion").fg(Color::Magenta),
    };
    let tone = match message.sentiment.label {
        SentimentLabel::Positive => Cell::new("positive").fg(Color::Green),
        SentimentLabel::Neutral => Cell::new("neutral").fg(Color::DarkGrey),
        SentimentLabel::Negative => Cell::new("negative").fg(Color::Red),
    };
    let unread = if message.read { "" } else { "●" };

    vec![
        Cell::new(message.created_at.format("%m-%d %H:%M")).fg(Color::DarkGrey),
        from,
        Cell::new(truncate(&message.payload.render(), 60)),
        tone,
        Cell::new(unread).fg(Color::Yellow),
    ]
}

/// Mark companion messages read.
pub async fn read(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
    up_to: Option<Uuid>,
    json: bool,
) -> Result<()> {
    let changed = state
        .pipeline
        .mark_read(user_id, conversation_id, up_to)
        .await?;

    if json {
        println!("{}", serde_json::json!({ "marked_read": changed }));
    } else {
        println!();
        println!(
            "  {} {} message{} marked read",
            style("✓").green().bold(),
            changed,
            if changed == 1 { "" } else { "s" }
        );
        println!();
    }

    Ok(())
}

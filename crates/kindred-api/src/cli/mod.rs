//! CLI command definitions for the `kindred` binary.
//!
//! Uses clap derive macros for argument parsing. Every command acts on behalf
//! of one user, given by `--user` or `KINDRED_USER_ID`.

pub mod conversation;
pub mod insight;
pub mod message;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use kindred_types::chat::MessagePayload;

/// Talk to your companions.
#[derive(Parser)]
#[command(name = "kindred", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The user acting.
    #[arg(long, env = "KINDRED_USER_ID", global = true)]
    pub user: Option<Uuid>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,kindred_core=debug,kindred_infra=debug",
            _ => "trace",
        }
    }

    pub fn user_id(&self) -> anyhow::Result<Uuid> {
        self.user
            .ok_or_else(|| anyhow::anyhow!("no user given; pass --user or set KINDRED_USER_ID"))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open (or resume) the active conversation with a companion.
    Start {
        /// Companion to talk to.
        companion: Uuid,
    },

    /// List conversations.
    #[command(alias = "ls")]
    List {
        /// Include archived conversations.
        #[arg(long)]
        all: bool,
    },

    /// Send a message and wait for the reply.
    Send {
        conversation: Uuid,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Regenerate the reply to the newest unanswered message.
    Retry { conversation: Uuid },

    /// Show a conversation's messages, oldest first.
    History {
        conversation: Uuid,

        /// Cursor returned by a previous page.
        #[arg(long)]
        cursor: Option<String>,

        /// Page size.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Mark companion messages as read.
    Read {
        conversation: Uuid,

        /// Only up to and including this message.
        #[arg(long)]
        up_to: Option<Uuid>,
    },

    /// Relationship, engagement and suggestions for a conversation.
    Insight { conversation: Uuid },

    /// Suggest what to talk about next.
    Suggest { conversation: Uuid },

    /// Engagement roll-up across all conversations with a companion.
    Engagement { companion: Uuid },

    /// Quality details of a companion message.
    Quality { message: Uuid },

    /// Apply idle-time decay to a relationship.
    Decay {
        companion: Uuid,

        /// Evaluate as of this instant (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Archive a conversation.
    Archive { conversation: Uuid },

    /// Make an archived conversation active again.
    Reactivate { conversation: Uuid },
}

/// What to send: text, or exactly one media reference.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct PayloadArgs {
    /// Message text.
    pub text: Option<String>,

    /// Reference to an uploaded photo.
    #[arg(long)]
    pub photo: Option<String>,

    /// Reference to an uploaded voice note.
    #[arg(long)]
    pub voice: Option<String>,

    /// Sticker identifier.
    #[arg(long)]
    pub sticker: Option<String>,
}

impl PayloadArgs {
    pub fn into_payload(self) -> MessagePayload {
        match (self.text, self.photo, self.voice, self.sticker) {
            (_, Some(media_ref), _, _) => MessagePayload::Photo { media_ref },
            (_, _, Some(media_ref), _) => MessagePayload::Voice { media_ref },
            (_, _, _, Some(media_ref)) => MessagePayload::Sticker { media_ref },
            (text, ..) => MessagePayload::text(text.unwrap_or_default()),
        }
    }
}

/// Shorten text for table cells.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_text_payload() {
        let cli = Cli::parse_from([
            "kindred",
            "--user",
            "0190a6b6-6f3c-7000-8000-000000000001",
            "send",
            "0190a6b6-6f3c-7000-8000-000000000002",
            "Hi",
        ]);
        match cli.command {
            Commands::Send { payload, .. } => {
                assert_eq!(payload.into_payload(), MessagePayload::text("Hi"));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_send_media_payload() {
        let cli = Cli::parse_from([
            "kindred",
            "send",
            "0190a6b6-6f3c-7000-8000-000000000002",
            "--sticker",
            "wave",
        ]);
        match cli.command {
            Commands::Send { payload, .. } => assert_eq!(
                payload.into_payload(),
                MessagePayload::Sticker {
                    media_ref: "wave".to_string()
                }
            ),
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_send_rejects_text_and_media_together() {
        let result = Cli::try_parse_from([
            "kindred",
            "send",
            "0190a6b6-6f3c-7000-8000-000000000002",
            "Hi",
            "--photo",
            "p.jpg",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long message", 10), "a rathe...");
    }
}

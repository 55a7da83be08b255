//! Kindred CLI entry point.
//!
//! Binary name: `kindred`
//!
//! Parses CLI arguments, initializes logging, opens the stores and wires the
//! message pipeline, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use kindred_observe::{LogFormat, TracingOptions};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        format: if cli.log_json { LogFormat::Json } else { LogFormat::Pretty },
        otel: cli.otel,
        default_filter: cli.log_filter().to_string(),
    };
    if let Err(e) = kindred_observe::init_tracing(&options) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let result = run(cli).await;
    kindred_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let user = cli.user_id()?;
    let json = cli.json;
    let state = AppState::init().await?;

    match cli.command {
        Commands::Start { companion } => {
            cli::conversation::start(&state, user, companion, json).await?;
        }
        Commands::List { all } => {
            cli::conversation::list(&state, user, all, json).await?;
        }
        Commands::Archive { conversation } => {
            cli::conversation::archive(&state, user, conversation, json).await?;
        }
        Commands::Reactivate { conversation } => {
            cli::conversation::reactivate(&state, user, conversation, json).await?;
        }

        Commands::Send { conversation, payload } => {
            cli::message::send(&state, user, conversation, payload, json).await?;
        }
        Commands::Retry { conversation } => {
            cli::message::retry(&state, user, conversation, json).await?;
        }
        Commands::History {
            conversation,
            cursor,
            limit,
        } => {
            cli::message::history(&state, user, conversation, cursor.as_deref(), limit, json).await?;
        }
        Commands::Read { conversation, up_to } => {
            cli::message::read(&state, user, conversation, up_to, json).await?;
        }

        Commands::Insight { conversation } => {
            cli::insight::insight(&state, user, conversation, json).await?;
        }
        Commands::Suggest { conversation } => {
            cli::insight::suggest(&state, user, conversation, json).await?;
        }
        Commands::Engagement { companion } => {
            cli::insight::engagement(&state, user, companion, json).await?;
        }
        Commands::Quality { message } => {
            cli::insight::quality(&state, user, message, json).await?;
        }
        Commands::Decay { companion, at } => {
            cli::insight::decay(&state, user, companion, at, json).await?;
        }
    }

    Ok(())
}

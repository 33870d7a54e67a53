use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use inquire::Text;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::ClientError;
use crate::events::queue::StateChange;
use crate::models::payload::DisplayPayload;
use crate::models::turn::Origin;
use crate::runtime::ClientRuntime;
use crate::service::backend_service::AgentBackend;

const QUIT_COMMAND: &str = "/quit";

#[derive(Parser)]
#[command(about = "Terminal client for the calendar agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talk to the agent interactively.
    Chat,
    /// Show how the agent parses a sentence.
    Parse { text: String },
    /// Show the agent's conversation context.
    State,
    /// Show every event the backend stores.
    Dump,
    /// Show events on one day (defaults to today).
    Calendar {
        #[arg(long)]
        date: Option<String>,
    },
    /// Run one input through the agent's test-case probe.
    TestCase {
        input: String,
        #[arg(long = "expect")]
        expected_intent: Option<String>,
    },
    /// Check that the backend is up.
    Health,
}

pub async fn cli(
    cli: Cli,
    runtime: ClientRuntime,
    changes: UnboundedReceiver<StateChange>,
) -> Result<(), ClientError> {
    match cli.command {
        Commands::Chat => chat_loop(&runtime, changes).await,
        Commands::Parse { text } => {
            let inspector = runtime.inspector();
            inspector.run_parse_intent(&text)?.settled().await;
            println!("{}", inspector.parse_intent_state().render());
            Ok(())
        }
        Commands::State => {
            let inspector = runtime.inspector();
            inspector.run_load_conversation_state().settled().await;
            println!("{}", inspector.conversation_state().render());
            Ok(())
        }
        Commands::Dump => {
            let inspector = runtime.inspector();
            inspector.run_load_event_dump().settled().await;
            println!("{}", inspector.event_dump_state().render());
            Ok(())
        }
        Commands::Calendar { date } => {
            let date = resolve_date(date.as_deref())?;
            let calendar = runtime.calendar();
            calendar.select_date(Some(date.clone()));
            calendar.load().settled().await;
            match calendar.events_state().error() {
                Some(detail) => println!("Error: {}", detail),
                None => {
                    println!("Events on {}:", date);
                    println!("{}", DisplayPayload::Events(calendar.visible()).render());
                }
            }
            Ok(())
        }
        Commands::TestCase {
            input,
            expected_intent,
        } => {
            let inspector = runtime.inspector();
            inspector
                .run_test_case(&input, expected_intent.as_deref())?
                .settled()
                .await;
            println!("{}", inspector.test_case_state().render());
            Ok(())
        }
        Commands::Health => {
            let status = runtime.backend().health().await?;
            println!("{}", DisplayPayload::Structured(status).render());
            Ok(())
        }
    }
}

/// Validates a `YYYY-MM-DD` argument, or falls back to today's local date.
pub fn resolve_date(date: Option<&str>) -> Result<String, ClientError> {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(|parsed| parsed.format("%Y-%m-%d").to_string())
            .map_err(|e| ClientError::InvalidArgument(format!("invalid date {}: {}", raw, e))),
        None => Ok(Local::now().date_naive().format("%Y-%m-%d").to_string()),
    }
}

async fn chat_loop(
    runtime: &ClientRuntime,
    mut changes: UnboundedReceiver<StateChange>,
) -> Result<(), ClientError> {
    let session = runtime.conversation();
    println!("Chatting with the calendar agent. Type {} to leave.", QUIT_COMMAND);

    loop {
        let Some(line) = prompt_line().await else {
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        match session.submit(&line) {
            Ok(pending) => {
                pending.settled().await;
            }
            Err(err) => {
                println!("({})", err);
                continue;
            }
        }

        while let Ok(change) = changes.try_recv() {
            match change {
                StateChange::TurnAppended {
                    origin: Origin::Agent,
                    text,
                    ..
                } => println!("Agent: {}", text),
                StateChange::SessionError { detail, .. } => println!("(failed: {})", detail),
                _ => {}
            }
        }
    }
    Ok(())
}

async fn prompt_line() -> Option<String> {
    // inquire blocks on the terminal.
    tokio::task::spawn_blocking(|| Text::new("You:").prompt().ok())
        .await
        .ok()
        .flatten()
}

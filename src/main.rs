use anyhow::Result;
use clap::Parser;
use colored::*;
use llm_compare::cli::{Cli, Commands};
use llm_compare::{
    utils, CompareSession, HistoryFile, LLMClient, SessionOutcome, Settings, TerminalPrompter,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    init_tracing(&settings);

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compare) => handle_compare(&settings).await,
        Some(Commands::History) => handle_history(&settings).await,
        None => Ok(()),
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_compare(settings: &Settings) -> Result<()> {
    let history = HistoryFile::new(settings.history_path()?);
    let mut prompter = TerminalPrompter::new();
    let mut client = LLMClient::new(settings);

    utils::print_header("Compare Files");

    let mut stdout = std::io::stdout();
    let outcome = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut stdout)
        .await?;

    if let SessionOutcome::Completed { record, .. } = outcome {
        utils::print_success(&format!("\nSession {} saved", record.id));
    }

    Ok(())
}

async fn handle_history(settings: &Settings) -> Result<()> {
    let history = HistoryFile::new(settings.history_path()?);
    let store = history.load().await;

    utils::print_header("Compare History");

    if store.sessions.is_empty() {
        utils::print_info("No sessions recorded yet");
        return Ok(());
    }

    for session in &store.sessions {
        let selector = if session.selector_text.is_empty() {
            "(no step)".to_string()
        } else {
            session.selector_text.clone()
        };

        println!(
            "  {} {} {}",
            format!("[{}]", session.id).bright_green().bold(),
            selector.bright_white(),
            format!("({})", session.timestamp).dimmed()
        );
        println!("      {} {}", "file 1:".dimmed(), session.file_path1);
        println!("      {} {}", "file 2:".dimmed(), session.file_path2);
        if !session.task_prompt.is_empty() {
            println!("      {} {}", "task:".dimmed(), session.task_prompt);
        }
    }

    Ok(())
}

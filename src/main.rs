mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::event::{self, EventSource};
use crate::config::{AppConfig, LlmProvider};
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::infra::llm::GeminiClient;
use crate::infra::smtp::SmtpMailer;
use crate::infra::sqlite::Database;
use crate::services::LanguageModelService;
use crate::workflow::ticket::WorkflowOutcome;

#[derive(Parser)]
#[command(name = "triage", author, version, about = "AI triage worker for new support tickets")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ticket-created workflow for one event.
    Handle(HandleArgs),
    /// Manage worker configuration.
    Config(ConfigArgs),
}

#[derive(Args)]
struct HandleArgs {
    /// Ticket id to triage, instead of reading an event.
    #[arg(short, long, conflicts_with = "event")]
    ticket_id: Option<String>,
    /// Path to a JSON `ticket/created` event. Read from stdin when omitted.
    #[arg(short, long)]
    event: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "triage=debug" } else { "triage=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> AppResult<bool> {
    match cli.command {
        Commands::Config(args) => {
            config_cmd::run(args.command)?;
            Ok(true)
        }
        Commands::Handle(args) => run_handle(args).await,
    }
}

async fn run_handle(args: HandleArgs) -> AppResult<bool> {
    let config = AppConfig::load()?;
    let context = build_context(config);

    let source = match (args.ticket_id, args.event) {
        (Some(id), _) => EventSource::TicketId(id),
        (None, Some(path)) => EventSource::File(path),
        (None, None) => EventSource::Stdin,
    };

    let outcome = match event::read_event(source).await {
        Ok(event) => event::run(&context, &event).await,
        Err(err) => {
            tracing::error!("error running ticket: {err}");
            WorkflowOutcome { success: false }
        }
    };

    let rendered = serde_json::to_string(&outcome)
        .map_err(|err| AppError::Configuration(format!("failed to render result: {err}")))?;
    println!("{rendered}");
    Ok(outcome.success)
}

fn build_context(config: AppConfig) -> AppContext {
    if config.gemini_api_key.is_none() {
        tracing::warn!("Gemini API key not configured; ticket triage will fail.");
    }
    if config.smtp.host.is_none() {
        tracing::warn!("SMTP host not configured; assignment emails will fail.");
    }
    if config.smtp.from.is_none() {
        tracing::warn!("SMTP sender address not configured; assignment emails will fail.");
    }

    let language_model: Arc<dyn LanguageModelService> = match &config.llm_provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        )),
        LlmProvider::Custom(provider) => {
            tracing::warn!(
                "custom LLM provider '{provider}' not yet implemented, using Gemini fallback."
            );
            Arc::new(GeminiClient::new(
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
                config.gemini_base_url.clone(),
            ))
        }
    };

    let database = Arc::new(Database::open(config.database_path.clone()));
    let mailer = Arc::new(SmtpMailer::new(config.smtp.clone()));

    AppContext::new(
        config,
        database.clone(),
        database.clone(),
        database,
        language_model,
        mailer,
    )
}

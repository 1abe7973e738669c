use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use inbox_digest::auth::StoredToken;
use inbox_digest::config::{LlmConfig, MailConfig, SummarizerConfig};
use inbox_digest::digest::{BatchSummarizer, run_listing};
use inbox_digest::llm::{LlmProvider, OpenAiCompatClient};
use inbox_digest::mail::{GmailClient, MailClient};

#[derive(Parser)]
#[command(
    name = "inbox-digest",
    version,
    about = "Summarize and categorize unread Gmail with an OpenAI-compatible model"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Count unread mail and preview snippets.
    List,
    /// Batch-summarize and categorize unread mail (default).
    Summarize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading any configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mail_config = MailConfig::from_env();
    let token = StoredToken::load(&mail_config.token_path)
        .context("Gmail credentials unavailable; run the OAuth setup first")?;
    let mail: Arc<dyn MailClient> = Arc::new(GmailClient::new(token.into_access_token())?);

    match cli.command.unwrap_or(Command::Summarize) {
        Command::List => run_listing(mail.as_ref()).await?,
        Command::Summarize => {
            let llm_config = LlmConfig::from_env()?;
            let summarizer_config = SummarizerConfig::from_env()?;

            eprintln!("inbox-digest v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Model: {}", llm_config.model);
            eprintln!("   Endpoint: {}", llm_config.base_url);
            eprintln!("   Batch size: {}\n", summarizer_config.batch_size);

            let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatClient::new(&llm_config)?);
            let summarizer = BatchSummarizer::new(mail, llm, summarizer_config);
            summarizer.run().await?;
        }
    }

    Ok(())
}

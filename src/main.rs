mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;
use scholar_agent::AgentDispatcher;
use scholar_core::{AppConfig, LlmBackend, LlmSettings, Session};
use scholar_llm::{AzureOpenAIClient, GitHubModelsClient, LLMConfig, LLMProvider};
use scholar_tools::{OntologySchema, OntologyTool};
use std::io::Write;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "scholar-assistant",
    about = "Conversational research assistant with literature, crawling, review, and Q&A agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8750
        #[arg(long)]
        bind: Option<String>,
    },
    /// Route a single question through the agents and print the reply
    Ask {
        /// The question, as free text
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let llm = build_provider(&config.llm)?;
    let schema = OntologySchema::load(&config.ontology_path)?;
    let dispatcher = Arc::new(AgentDispatcher::new(llm, OntologyTool::new(schema)));

    match cli.command {
        Commands::Serve { bind } => {
            server::serve(dispatcher, bind.unwrap_or(config.bind_addr)).await
        }
        Commands::Ask { question } => ask(dispatcher, question.join(" ")).await,
    }
}

fn build_provider(settings: &LlmSettings) -> Result<Arc<dyn LLMProvider>> {
    let config = LLMConfig {
        api_key: settings.api_key.clone(),
        endpoint: settings.endpoint.clone(),
        model: settings.model.clone(),
        api_version: settings.api_version.clone(),
        temperature: settings.temperature,
    };

    Ok(match settings.backend {
        LlmBackend::Azure => Arc::new(AzureOpenAIClient::new(config)?),
        LlmBackend::Github => Arc::new(GitHubModelsClient::new(config)),
    })
}

async fn ask(dispatcher: Arc<AgentDispatcher>, question: String) -> Result<()> {
    if question.trim().is_empty() {
        eprintln!("{}", "Nothing to ask.".yellow());
        return Ok(());
    }

    println!("{}", "Thinking...".dimmed());

    let mut session = Session::new();
    let mut stream = dispatcher.dispatch_stream(&question, &mut session).await;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment);
        stdout.flush()?;
    }
    println!();

    Ok(())
}

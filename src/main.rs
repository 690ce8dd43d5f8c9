use anyhow::Result;
use askdb::config::AppConfig;
use askdb::db::PgDatabase;
use askdb::llm::LlmClient;
use askdb::{Orchestrator, SchemaCatalog};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask questions of a PostgreSQL database in plain language")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to bind (overrides ASKDB_BIND)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Answer a single question and print the JSON result
    Ask {
        /// The question in natural language
        question: String,

        /// Also summarize the result
        #[arg(long)]
        chat: bool,
    },
    /// Report database reachability and catalog status
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askdb=info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::load()?;

    let database = Arc::new(PgDatabase::new(&config.database_url, config.connect_timeout)?);
    let llm = Arc::new(LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.llm_base_url.clone(),
    ));
    info!("Using model {} at {}", llm.model(), config.llm_base_url);

    info!("Extracting database schema...");
    let catalog = SchemaCatalog::build_or_degrade(database.introspector().await).await;
    if !catalog.is_empty() {
        info!("Schema:\n{}", catalog.render());
    }

    let orchestrator = Arc::new(Orchestrator::new(Arc::new(catalog), llm, database));

    match args.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or(config.bind_addr);
            askdb::server::serve(&bind, orchestrator).await?;
        }
        Command::Ask { question, chat } => {
            let output = if chat {
                serde_json::to_string_pretty(&orchestrator.chat(&question).await?)?
            } else {
                serde_json::to_string_pretty(&orchestrator.generate_sql(&question).await?)?
            };
            println!("{}", output);
        }
        Command::Health => {
            let report = orchestrator.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

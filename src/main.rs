use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use atelier_agent::{CompletionTaskRunner, Pipeline, TaskReflector};
use atelier_core::config::AppConfig;
use atelier_llm::{OpenAiClient, OpenAiEmbeddings};
use atelier_memory::ReflectionStore;

#[derive(Parser)]
#[command(name = "atelier", version, about = "Role-based multi-step agent workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "atelier.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow for a query and print the final report
    Run {
        /// The query to decompose and execute
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,

        /// Record a reflection for each completed task
        #[arg(long)]
        reflect: bool,

        /// Override the configured step bound
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            query,
            reflect,
            max_steps,
        } => {
            let query = query.join(" ");
            let max_steps = max_steps.unwrap_or(config.engine.max_steps);

            let llm = Arc::new(OpenAiClient::new(&config.model));
            let runner = Arc::new(CompletionTaskRunner::new(llm.clone()));
            let pipeline = Pipeline::new(llm.clone(), llm.clone(), runner, max_steps)?;

            let state = pipeline.run(&query).await?;
            println!("{}", state.final_output);

            if reflect {
                let embedder = Arc::new(OpenAiEmbeddings::new(&config.embedding));
                let store = Arc::new(ReflectionStore::open(
                    config.reflection.db_path.as_str(),
                    embedder,
                )?);
                let reflector = TaskReflector::new(llm, store.clone());

                for (task, result) in state.tasks.iter().zip(state.results.iter()) {
                    match reflector.run(&task.description, result).await {
                        Ok(record) => info!(
                            id = %record.id,
                            needs_retry = record.judgement.needs_retry,
                            confidence = record.judgement.confidence,
                            "reflection recorded"
                        ),
                        Err(e) => warn!(task = %task.description, error = %e, "reflection failed"),
                    }
                }
                info!(records = store.len(), path = %store.path().display(), "reflection store updated");
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

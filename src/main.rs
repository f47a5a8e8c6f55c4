use clap::{Parser, Subcommand};
use dagplan::config::ModelConfig;
use dagplan::plan::{execute_plan_with_limit, is_valid_plan, parse_plan};
use dagplan::transport::{HttpModelClient, ModelClient, StaticModelClient};
use dagplan::{demo_tools, logging};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "dagplan", author, version, about = "Plan, validate, and execute tool-call DAGs produced by an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a query to the model and print the parsed plan.
    Plan {
        #[arg(long)]
        query: String,
        /// Skip the live model endpoint and use a canned demo response.
        #[arg(long)]
        offline: bool,
    },
    /// Parse and statically validate a plan file against the demo catalog.
    Validate {
        #[arg(long)]
        plan: PathBuf,
    },
    /// Parse, validate, and execute a plan file, printing ordered results.
    Execute {
        #[arg(long)]
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(Level::INFO).ok();

    let config = ModelConfig::load_or_init()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Plan { query, offline } => {
            let client: Box<dyn ModelClient> = if offline {
                Box::new(StaticModelClient::new(
                    "<plan>[{\"toolName\": \"get_weather\", \"arguments\": {\"city\": \"Paris\"}}]</plan>",
                ))
            } else {
                Box::new(HttpModelClient::new())
            };

            let raw = client.complete(&query, &config).await.map_err(|e| match e {
                dagplan::error::TransportError::EmptyResponse => {
                    anyhow::anyhow!("No response from model")
                }
                other => anyhow::anyhow!(other.to_string()),
            })?;

            let plan = parse_plan(&raw).map_err(|e| anyhow::anyhow!("No plan generated: {e}"))?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Command::Validate { plan } => {
            let raw = std::fs::read_to_string(&plan)?;
            let plan = parse_plan(&raw)?;
            let tools = demo_tools::catalog();
            let report = is_valid_plan(&plan, &tools);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Execute { plan } => {
            let raw = std::fs::read_to_string(&plan)?;
            let plan = parse_plan(&raw)?;
            let tools = demo_tools::catalog();

            let report = is_valid_plan(&plan, &tools);
            if !report.valid {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            let results = execute_plan_with_limit(&plan, &tools, config.max_parallel_steps).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

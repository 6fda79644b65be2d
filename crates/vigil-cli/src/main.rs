//! `vigil` -- command-line entry point for the agent runtime.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil_core::Runtime;
use vigil_types::chat::ChatSource;
use vigil_types::config::RuntimeConfig;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Autonomous persistent agent runtime")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agent loop and run until interrupted.
    Run,
    /// Print the agent's current status.
    Status,
    /// Print the budget picture.
    Budget,
    /// Send one message to the agent and wait for the reply.
    Chat {
        /// The message to send.
        message: String,
    },
}

fn build_runtime(config_path: Option<&PathBuf>) -> anyhow::Result<Runtime> {
    let config = RuntimeConfig::load(config_path.map(|p| p.as_path()))
        .context("failed to load configuration")?;
    let runtime = Runtime::build(config).context("failed to assemble runtime")?;
    vigil_tools::register_builtin(
        runtime.registry(),
        runtime.config().data_dir.clone(),
        runtime.vector(),
        runtime.budget_store(),
        runtime.secrets(),
    );
    Ok(runtime)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run => run(cli.config.as_ref()).await,
        Command::Status => {
            let runtime = build_runtime(cli.config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&runtime.get_status())?);
            Ok(())
        }
        Command::Budget => {
            let runtime = build_runtime(cli.config.as_ref())?;
            let status = runtime.get_budget_status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Chat { message } => {
            let runtime = Arc::new(build_runtime(cli.config.as_ref())?);
            let supervisor = runtime.start();
            let reply = runtime.enqueue_chat(message, ChatSource::Web);
            let outcome = reply.await.context("agent dropped the chat")?;
            println!("{}", outcome.reply);
            runtime.shutdown();
            let _ = supervisor.await;
            Ok(())
        }
    }
}

async fn run(config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    let runtime = Arc::new(build_runtime(config_path)?);
    info!("starting agent");
    let supervisor = runtime.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("interrupt received, shutting down");
    runtime.shutdown();
    let _ = supervisor.await;
    Ok(())
}

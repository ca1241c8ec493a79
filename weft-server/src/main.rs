use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use weft_agent::EchoLlm;
use weft_core::{AgentConfig, Llm, Result, WeftError};
use weft_server::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one agent of the weft fabric", long_about = None)]
struct Cli {
    /// Path to a YAML agent configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured agent id
    #[arg(long)]
    agent_id: Option<String>,

    /// Override the configured display name
    #[arg(long)]
    agent_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_yaml::from_str::<AgentConfig>(&raw)
                .map_err(|e| WeftError::Config(format!("{}: {}", path.display(), e)))?
        }
        None => AgentConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(agent_id) = cli.agent_id {
        config.agent_id = agent_id;
    }
    if let Some(agent_name) = cli.agent_name {
        config.display_name = agent_name;
    }

    // Model providers are wired in by embedding processes through the
    // library API; the binary only knows the self-contained echo adapter.
    let llm: Arc<dyn Llm> = match config.llm_model.as_str() {
        "mock" | "echo" => Arc::new(EchoLlm),
        other => {
            return Err(WeftError::Config(format!(
                "no model adapter registered for '{}'; embed the runtime and inject one",
                other
            )));
        }
    };

    weft_server::serve(AppState::new(config, llm)).await
}

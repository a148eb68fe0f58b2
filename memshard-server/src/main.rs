mod api_server;
mod commands;
mod config;
mod http_error;
mod node_server;

use api_server::run_api_server;
use clap::{Parser, Subcommand};
use commands::{ClientCommand, DEFAULT_API_URL};
use config::Config;
use node_server::run_node_server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "memshard")]
#[command(about = "Split files into chunks scattered across in-memory storage nodes")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Base URL of the API server, for client commands
    #[arg(long, global = true, default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator API server
    Api,
    /// Start a storage node
    Node {
        /// Port to listen on, overrides storage_port
        #[arg(long)]
        port: Option<u16>,

        /// Identifier reported in node responses, overrides server_id
        #[arg(long)]
        server_id: Option<String>,
    },
    #[command(flatten)]
    Client(ClientCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memshard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Api => {
            let cfg = load_config(cli.config.as_deref());
            tracing::info!(
                "Starting API server with {} storage servers",
                cfg.storage_servers.len()
            );

            if let Err(e) = run_api_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Node { port, server_id } => {
            let mut cfg = load_config(cli.config.as_deref());
            if let Some(port) = port {
                cfg.storage_port = port;
            }
            if let Some(server_id) = server_id {
                cfg.server_id = server_id;
            }
            tracing::info!("Starting storage node {}", cfg.server_id);

            if let Err(e) = run_node_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Client(command) => {
            if let Err(e) = commands::run(command, &cli.api_url).await {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(path: Option<&str>) -> Config {
    match Config::load(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

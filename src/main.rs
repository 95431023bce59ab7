use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tokio::io::BufReader;
use tracing::info;

use novel_navigator::config::AppConfig;
use novel_navigator::repl;
use novel_navigator::web_server::{self, AppState};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the web UI with both modes.
    Serve {
        #[arg(long, default_value = "127.0.0.1", help = "Address to bind the web server to.")]
        host: IpAddr,
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
    },
    /// Answer a few questions in the terminal and get book recommendations.
    Recommend,
    /// Free-form chat in the terminal.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,novel_navigator=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Novel Navigator starting with command: {:?}", cli.command);

    let config = cli.config;
    match cli.command {
        Commands::Serve { host, port } => {
            let state = AppState::new(
                config.templates.clone(),
                config.dialogue()?,
                config.chat()?,
                config.cover_resolver()?,
            );
            web_server::start_web_server(SocketAddr::new(host, port), state)
                .await
                .context("Web server failed")?;
            info!("Shutdown complete.");
        }
        Commands::Recommend => {
            let dialogue = config.dialogue()?;
            repl::run_recommender(
                &dialogue,
                &config.cover_resolver()?,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .context("Recommendation session failed")?;
        }
        Commands::Chat => {
            info!("Starting interactive chat session...");
            repl::run_chat(
                &config.chat()?,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .context("Chat session failed")?;
            info!("Chat session finished.");
        }
    }

    Ok(())
}

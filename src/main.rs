//! rstomp - STOMP command-line client
//!
//! Connects to a broker, performs the handshake and sends receipted messages.

use clap::{Parser, Subcommand};
use colored::Colorize;
use rstomp_client::{Client, ClientConfig, ClientError, HookResult, SessionHandler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rstomp")]
#[command(about = "Command-line client for STOMP message brokers")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "RSTOMP_CONFIG")]
    config: Option<PathBuf>,

    /// Broker address (host:port)
    #[arg(short, long)]
    addr: Option<String>,

    /// Virtual host announced in CONNECT
    #[arg(long)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the handshake and disconnect
    Connect,

    /// Send a message and wait for the broker's receipt
    Send {
        /// Destination, e.g. /queue/orders
        destination: String,

        /// Message body (or @file to read from file)
        payload: String,

        /// Number of times to send the message
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },
}

/// Logs session lifecycle events.
struct LoggingHandler;

impl SessionHandler for LoggingHandler {
    fn on_attach(&mut self) -> HookResult {
        tracing::info!("session attached");
        Ok(())
    }

    fn on_detach(&mut self) -> HookResult {
        tracing::info!("session detached");
        Ok(())
    }

    fn on_disconnect(&mut self) -> HookResult {
        tracing::debug!("transport closed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClientConfig::load_from(cli.config.as_deref())?;
    if let Some(path) = cli.config.as_ref() {
        tracing::info!("Loaded config from {}", path.display());
    }
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    config.validate()?;

    tracing::debug!("Connecting to {} (host {})", config.addr, config.host);
    let client = Client::connect(config, LoggingHandler).await?;

    match cli.command {
        Commands::Connect => {
            println!(
                "{} {} (STOMP {})",
                "Connected to".green(),
                client.config().addr,
                client.server_version().as_deref().unwrap_or("?")
            );
        }
        Commands::Send {
            destination,
            payload,
            count,
        } => {
            let body = read_payload(&payload)?;
            let started = Instant::now();
            for _ in 0..count {
                if let Err(e) = client.send_and_wait(destination.as_str(), body.as_str()).await {
                    // Fatal errors have already torn the connection down.
                    if !e.is_fatal() {
                        let _ = client.disconnect().await;
                    }
                    return Err(e.into());
                }
            }
            println!(
                "{} {} message(s) to {} in {:?}",
                "Sent".green(),
                count,
                destination,
                started.elapsed()
            );
        }
    }

    match client.disconnect().await {
        Ok(()) | Err(ClientError::SessionNotReady(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reads a payload argument (either inline text or @file).
fn read_payload(arg: &str) -> Result<String, std::io::Error> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(arg.to_string()),
    }
}

// ============================================
// File: crates/argus-client/src/main.rs
// ============================================
//! # Argus Agent Entry Point
//!
//! ## Creation Reason
//! Main entry point for the headless Argus endpoint agent binary.
//! Handles CLI parsing, logging setup, identity bootstrap, and the
//! polling loop lifecycle.
//!
//! ## Usage
//! ```bash
//! # Run the agent (generates a key on first start)
//! argus-agent run --config /etc/argus/agent.toml
//!
//! # Validate a configuration file
//! argus-agent validate --config /etc/argus/agent.toml
//!
//! # Print this agent's identity name
//! argus-agent identity --config /etc/argus/agent.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is a headless agent: persistent failure surfaces only via
//!   logs and the exit code, never an interactive UI
//! - The process exits non-zero on the fatal error path so a supervisor
//!   (systemd, launchd) restarts it and re-evaluates network conditions
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use argus_client::agent::Agent;
use argus_client::comms::ClientCommunicator;
use argus_client::config::ClientConfig;
use argus_client::http::ReqwestChannel;
use argus_client::registry::ActionRegistry;
use argus_core::crypto::{Certificate, IdentityKeyPair};

// ============================================
// CLI Definition
// ============================================

/// Argus fleet endpoint agent
#[derive(Parser, Debug)]
#[command(name = "argus-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent polling loop
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/agent.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/agent.toml")]
        config: PathBuf,
    },

    /// Show this agent's identity name (generates a key if missing)
    Identity {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/agent.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging("info");

    let result = match cli.command {
        Commands::Run { config } => cmd_run(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Identity { config } => cmd_identity(config).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}

/// Initializes tracing with an env-filter override.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

// ============================================
// Commands
// ============================================

/// Runs the agent polling loop until shutdown or fatal failure.
async fn cmd_run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ClientConfig::load(&config_path).await?;
    let identity = load_or_generate_identity(&config).await?;
    info!(client_id = %identity.client_id()?, "agent identity ready");

    let mut communicator = ClientCommunicator::new(identity, config.seal_options())?;
    let server_certificate = load_server_certificate(&config).await?;
    communicator.load_server_certificate(server_certificate)?;

    let channel = ReqwestChannel::new(config.transport.request_timeout())?;
    let registry = builtin_registry();

    let mut agent = Agent::new(config, communicator, channel, registry);

    // Stop cleanly at the next cycle boundary on Ctrl-C.
    let shutdown = agent.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    agent.run().await?;
    Ok(())
}

/// Validates the configuration file and reports the result.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ClientConfig::load(&config_path).await?;
    println!("Configuration OK: {} control URL(s)", config.transport.control_urls.len());
    Ok(())
}

/// Prints the agent's key-derived identity name.
async fn cmd_identity(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ClientConfig::load(&config_path).await?;
    let identity = load_or_generate_identity(&config).await?;
    println!("{}", identity.client_id()?);
    Ok(())
}

// ============================================
// Identity Bootstrap
// ============================================

/// Loads the agent key, generating and persisting one on first run.
async fn load_or_generate_identity(config: &ClientConfig) -> anyhow::Result<IdentityKeyPair> {
    let path = &config.identity.key_file;
    match tokio::fs::read_to_string(path).await {
        Ok(pem) => Ok(IdentityKeyPair::from_pkcs8_pem(&pem)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path, "no identity key found, generating");
            let identity = IdentityKeyPair::generate()?;
            if let Some(parent) = std::path::Path::new(path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let pem = identity.to_pkcs8_pem()?;
            tokio::fs::write(path, pem.as_bytes()).await?;
            Ok(identity)
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads the server certificate the agent was shipped with.
async fn load_server_certificate(config: &ClientConfig) -> anyhow::Result<Certificate> {
    let path = &config.identity.server_certificate_file;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading server certificate '{path}': {e}"))?;
    Ok(Certificate::from_bytes(&bytes)?)
}

// ============================================
// Built-in Actions
// ============================================

/// Registers the handful of actions every agent supports.
///
/// Registration is explicit and happens exactly here; adding an action
/// means adding a line, not an import-time side effect.
fn builtin_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register("echo", |message| Ok(message.payload.clone()));
    registry.register("agent_info", |_| {
        let info = format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );
        Ok(info.into_bytes())
    });
    registry
}

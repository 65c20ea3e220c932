// ============================================
// File: crates/argus-server/src/main.rs
// ============================================
//! # Argus Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the Argus fleet server binary. Handles CLI
//! parsing, logging setup, identity bootstrap, and serving the control
//! endpoint.
//!
//! ## Usage
//! ```bash
//! # One-time: generate CA and server identities
//! argus-server init-keys --config /etc/argus/server.toml
//!
//! # Start serving
//! argus-server start --config /etc/argus/server.toml
//!
//! # Validate a configuration file
//! argus-server validate --config /etc/argus/server.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `init-keys` refuses to overwrite existing key material; rotating
//!   the CA is a deliberate manual operation, not a rerun
//! - The server certificate file is what gets distributed to agents
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use argus_common::cache::BoundedCache;
use argus_core::crypto::{Certificate, IdentityKeyPair};

use argus_server::communicator::ServerCommunicator;
use argus_server::config::ServerConfig;
use argus_server::dispatch::LoggingSink;
use argus_server::enroll::EnrollmentService;
use argus_server::outbox::Outbox;
use argus_server::sequencer::SessionSequencer;
use argus_server::server::{router, ServerState};
use argus_server::store::{IdentityStore, InMemoryIdentityStore};

// ============================================
// Constants
// ============================================

/// Common name of the server identity.
const SERVER_NAME: &str = "server";

/// Common name of the certificate authority identity.
const CA_NAME: &str = "ca";

/// Validity of the server's own certificate (10 years).
const SERVER_CERT_VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

// ============================================
// CLI Definition
// ============================================

/// Argus fleet server
#[derive(Parser, Debug)]
#[command(name = "argus-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the fleet server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/server.toml")]
        config: PathBuf,
    },

    /// Generate CA and server identities
    InitKeys {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/server.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/argus/server.toml")]
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
        Commands::Start { config } => cmd_start(config).await,
        Commands::InitKeys { config } => cmd_init_keys(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
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

/// Starts the control endpoint.
async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path).await?;

    let ca = load_identity(&config.identity.ca_key_file).await?;
    let server_identity = load_identity(&config.identity.server_key_file).await?;
    let server_certificate =
        load_certificate(&config.identity.server_certificate_file).await?;
    info!(subject = %server_certificate.subject, "server identity loaded");

    let store: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());

    let communicator = ServerCommunicator::new(
        server_identity,
        server_certificate.subject.clone(),
        ca.public_key(),
        Arc::clone(&store),
        BoundedCache::new(
            config.limits.identity_cache_capacity,
            config.limits.identity_cache_ttl(),
        ),
        SessionSequencer::new(
            config.limits.sequencer_capacity,
            config.limits.sequencer_ttl(),
            config.limits.freshness_tolerance(),
        ),
        config.seal_options(),
    );
    let enrollment = EnrollmentService::new(
        ca,
        CA_NAME,
        store,
        config.enrollment.certificate_validity(),
        config.enrollment.allowlist.clone(),
    );

    let state = Arc::new(ServerState {
        communicator,
        enrollment,
        outbox: Outbox::new(config.limits.max_client_outbox),
        sink: Arc::new(LoggingSink),
        max_response_size: config.limits.max_response_size,
    });

    let listener = tokio::net::TcpListener::bind(config.network.listen_addr).await?;
    info!(addr = %config.network.listen_addr, "control endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Generates and persists the CA and server identities.
async fn cmd_init_keys(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path).await?;

    for path in [
        &config.identity.ca_key_file,
        &config.identity.server_key_file,
        &config.identity.server_certificate_file,
    ] {
        if tokio::fs::try_exists(path).await? {
            anyhow::bail!("refusing to overwrite existing '{path}'");
        }
    }

    info!("generating CA identity");
    let ca = IdentityKeyPair::generate()?;
    info!("generating server identity");
    let server_identity = IdentityKeyPair::generate()?;
    let server_certificate = Certificate::issue(
        SERVER_NAME,
        &server_identity.public_key(),
        CA_NAME,
        &ca,
        0,
        SERVER_CERT_VALIDITY,
    )?;

    write_private(&config.identity.ca_key_file, &ca).await?;
    write_private(&config.identity.server_key_file, &server_identity).await?;
    tokio::fs::write(
        &config.identity.server_certificate_file,
        server_certificate.to_bytes(),
    )
    .await?;

    println!("CA key:             {}", config.identity.ca_key_file);
    println!("Server key:         {}", config.identity.server_key_file);
    println!(
        "Server certificate: {} (distribute this to agents)",
        config.identity.server_certificate_file
    );
    Ok(())
}

/// Validates the configuration file and reports the result.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path).await?;
    println!("Configuration OK: listening on {}", config.network.listen_addr);
    Ok(())
}

// ============================================
// Identity Material I/O
// ============================================

/// Loads a private key from a PKCS#8 PEM file.
async fn load_identity(path: &str) -> anyhow::Result<IdentityKeyPair> {
    let pem = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading key '{path}': {e}"))?;
    Ok(IdentityKeyPair::from_pkcs8_pem(&pem)?)
}

/// Loads a certificate from its binary file.
async fn load_certificate(path: &str) -> anyhow::Result<Certificate> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading certificate '{path}': {e}"))?;
    Ok(Certificate::from_bytes(&bytes)?)
}

/// Writes a private key as PKCS#8 PEM, creating parent directories.
async fn write_private(path: &str, identity: &IdentityKeyPair) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pem = identity.to_pkcs8_pem()?;
    tokio::fs::write(path, pem.as_bytes()).await?;
    Ok(())
}

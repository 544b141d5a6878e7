use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use replica_api::ProgramCatalog;
use replica_api_server::{ReplicaServer, ServerConfig};

#[derive(Parser)]
#[command(name = "replica-server", about = "Local canister replica for integration tests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the replica HTTP API.
    Serve {
        /// Path to TOML configuration file. Defaults apply when omitted.
        #[arg(long, env = "REPLICA_CONFIG")]
        config: Option<String>,

        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write one module artifact per known program.
    Build {
        /// Output directory; artifacts land in `<out>/<name>/<name>.canister`.
        #[arg(long, default_value = "target/canisters")]
        out: PathBuf,
    },
}

fn catalog() -> ProgramCatalog {
    let mut catalog = ProgramCatalog::new();
    canister_example::register(&mut catalog);
    canister_migratable::register(&mut catalog);
    catalog
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { config, port } => serve(config, port).await,
        Command::Build { out } => build(&out),
    }
}

async fn serve(config_path: Option<String>, port: Option<u16>) {
    let mut config = match config_path {
        Some(path) => {
            tracing::info!(config = %path, "loading configuration");
            match ServerConfig::load(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load config");
                    std::process::exit(1);
                }
            }
        }
        None => ServerConfig::default(),
    };
    if let Some(port) = port {
        config.port = port;
    }

    let catalog = catalog();
    tracing::info!(programs = catalog.len(), "starting replica server");
    let server = match ReplicaServer::start(config, catalog).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    tracing::info!(url = %server.url(), "replica-server started, press Ctrl+C to stop");
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        }
        tracing::info!("shutting down...");
        shutdown.cancel();
    });

    if let Err(e) = server.wait().await {
        tracing::error!(error = %e, "server terminated with error");
        std::process::exit(1);
    }
}

fn build(out: &Path) {
    match replica_engine::module_host::build_artifacts(&catalog(), out) {
        Ok(paths) => tracing::info!(count = paths.len(), out = %out.display(), "artifacts written"),
        Err(e) => {
            tracing::error!(error = %e, "failed to write artifacts");
            std::process::exit(1);
        }
    }
}

//! Dubwave - AI video dubbing service
//!
//! Entry point: loads configuration, wires the processing services together
//! and serves the HTTP API.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubwave::api::{self, AppState};
use dubwave::auth::AuthKeys;
use dubwave::cli::{Args, Commands};
use dubwave::config::Config;
use dubwave::job::JobStore;
use dubwave::media::MediaToolsFactory;
use dubwave::payment::{PaymentStore, SimulatedGateway};
use dubwave::pipeline::JobOrchestrator;
use dubwave::storage::BlobStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    match args.command {
        Commands::Init { output } => {
            // Never reads the existing file: init must be able to replace a
            // corrupt config.toml.
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Doctor => {
            let config = load_config(&args)?;
            let media = MediaToolsFactory::create(config.media.clone());
            match media.check_availability() {
                Ok(()) => println!("Media tooling is available"),
                Err(e) => {
                    println!("Media tooling check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve { ref bind } => {
            let mut config = load_config(&args)?;
            if let Some(bind) = bind {
                config.server.bind_addr = bind.clone();
            }
            serve(config).await?;
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let config = Config::discover(args.config.as_deref(), &std::env::current_dir()?)?;
    config.validate()?;
    Ok(config)
}

async fn serve(config: Config) -> Result<()> {
    let blobs = BlobStore::new(&config.storage.root).await?;
    let store = JobStore::new();
    let auth = AuthKeys::new(&config.auth);
    let payments = PaymentStore::new(Arc::new(SimulatedGateway));

    let max_upload_bytes = config.server.max_upload_mb * 1024 * 1024;
    let bind_addr = config.server.bind_addr.clone();

    let orchestrator = Arc::new(JobOrchestrator::from_config(config, store, blobs));
    let state = AppState {
        orchestrator,
        payments,
        auth,
    };

    let app = api::router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Dubwave API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".dubwave").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "dubwave.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(level = %log_level, dir = %log_dir.display(), "Logging initialized");
    Ok(())
}

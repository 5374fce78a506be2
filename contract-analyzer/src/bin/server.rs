//! Contract analysis server binary
//!
//! Usage:
//!   analyzer-server [--config <PATH>] [--log-level <LEVEL>]

use anyhow::{Context, Result};
use clap::Parser;
use contract_analyzer::api::{create_router, ApiState};
use contract_analyzer::{AnalyzerConfig, DEFAULT_SESSION_SECRET};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "analyzer-server", version, about = "Serve structured contract analysis over HTTP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Contract Analyzer v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env file");
        }
    }

    let mut config = AnalyzerConfig::load(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;
    config.apply_env();

    if config.auth.session_secret == DEFAULT_SESSION_SECRET {
        warn!("Using the built-in session secret; set JWT_SECRET_KEY in production");
    }
    if config.auth.required && config.auth.admin_token.is_none() && config.auth.user_token.is_none() {
        warn!("Authentication is required but no API tokens are configured; every request will be rejected");
    }

    let state = ApiState::from_config(&config).context("Failed to configure LLM provider")?;
    info!(
        provider = config.llm.provider_type,
        model = config.llm.model,
        max_file_size = config.max_file_size,
        extensions = ?config.supported_extensions,
        auth_required = config.auth.required,
        "Configured analysis service"
    );

    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use clap::{Parser, Subcommand};
use http::{Method, header::CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};

use anyhow::anyhow;

use askademia_gateway::{
    ServerConfig, core::session_store::SessionHandleStore, routes, state::AppState,
};

/// Askademia Gateway - Realtime multimodal relay to Gemini Live
#[derive(Parser, Debug)]
#[command(name = "askademia-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay server (default)
    Serve,

    /// Forget the persisted session resumption handle so the next
    /// conversation starts fresh
    ResetSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize crypto provider for the upstream wss connection
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(ref config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::from_env()?
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::ResetSession => {
            let store = SessionHandleStore::open(&config.session_handle_path);
            store.clear().await?;
            println!(
                "Session handle cleared ({})",
                config.session_handle_path.display()
            );
            Ok(())
        }
        Commands::Serve => serve(config).await,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let address = config.address();
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    // Create application state
    let app_state = AppState::from_config(config)?;
    let registry = app_state.registry.clone();

    // Configure CORS
    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(false)
        } else {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
    } else {
        // No allow_origin = same-origin only (browsers block cross-origin requests)
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false)
    };

    let listener = routes::bind(&app_state.config)
        .await
        .map_err(|e| anyhow!("Failed to bind server address '{}': {}", address, e))?;

    let app = routes::create_app(app_state).layer(cors_layer);

    println!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
        registry.shutdown_all();
    })
    .await?;

    info!("Server stopped");
    Ok(())
}

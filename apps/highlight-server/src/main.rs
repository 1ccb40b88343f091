//! Highlight Server
//!
//! Accepts a pair of PDFs plus the mismatches found between them, highlights
//! every mismatch on both documents and writes the annotated copies to the
//! output directory. The second document also gets a callout per mismatch
//! showing the first document's value.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use highlight_core::Highlighter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
#[cfg(test)]
mod tests;

use api::{handle_debug, handle_health, handle_highlight};

/// Command-line arguments for the highlight server
#[derive(Parser, Debug)]
#[command(name = "highlight-server")]
#[command(about = "Highlights mismatches across a pair of PDF documents")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8001")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory annotated PDFs are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Maximum request body size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub output_dir: PathBuf,
    pub highlighter: Arc<Highlighter>,
}

impl AppState {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            highlighter: Arc::new(Highlighter::default()),
        }
    }
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/highlight", post(handle_highlight))
        .route("/debug", post(handle_debug))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&args.output_dir).await?;

    let state = AppState::new(args.output_dir.clone());
    let app = build_router(state, args.max_upload_mb * 1024 * 1024);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Writing outputs to {}", args.output_dir.display());
    info!("Upload limit: {} MB", args.max_upload_mb);

    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use kvindex::IndexConfig;
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// sled database directory (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,
    /// JSON config file with `store` and `tokenizer` sections
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path).with_context(|| format!("reading config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some(db) = args.db {
        config.store.path = db;
    }
    let app: Router = build_app(&config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, db = %config.store.path.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use backlinkse_server::{dirs, seed, store::Store, ServerConfig};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "backlinkse", about = "Backlinkse agency API server", version)]
struct Cli {
    /// Directory holding backlinkse.db (default: $BACKLINKSE_DATA_DIR or the platform data dir)
    #[arg(long, env = "BACKLINKSE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default: $BACKLINKSE_PORT or 5004)
        #[arg(long)]
        port: Option<u16>,
        /// Host to bind (default: $BACKLINKSE_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
    },
    /// Create a verified admin account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password (prefer $BACKLINKSE_ADMIN_PASSWORD over the flag)
        #[arg(long, env = "BACKLINKSE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Insert the default content and site configuration where missing
    Seed,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BACKLINKSE_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(cli.data_dir, host, port).await,
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => cmd_create_admin(cli.data_dir, &name, &email, &password),
        Commands::Seed => cmd_seed(cli.data_dir),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

fn open_store(data_dir: Option<PathBuf>) -> Result<Store> {
    let dir = dirs::data_dir(data_dir.as_deref())?;
    Store::open(&dir.join(dirs::DB_FILE)).context("open store")
}

async fn cmd_serve(data_dir: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut cfg = ServerConfig::from_env()?;
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if data_dir.is_some() {
        cfg.data_dir = data_dir;
    }
    backlinkse_server::run(cfg).await
}

fn cmd_create_admin(data_dir: Option<PathBuf>, name: &str, email: &str, password: &str) -> Result<()> {
    let store = open_store(data_dir)?;
    let admin = seed::create_admin(&store, name, email, password, Utc::now())
        .with_context(|| format!("create admin {email}"))?;
    println!("created admin {} ({})", admin.email, admin.id);
    Ok(())
}

fn cmd_seed(data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    let inserted = seed::seed_all(&store, Utc::now())?;
    if inserted == 0 {
        println!("content already seeded");
    } else {
        println!("seeded {inserted} content documents");
    }
    Ok(())
}

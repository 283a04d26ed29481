//! CryptoLock - OpenPGP key registry and message encryption service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use cryptolock::{
    config::Args,
    db::{MemoryUserDirectory, MongoClient, MongoUserDirectory, UserDirectory},
    logging::{self, AuditLogger},
    pgp::SequoiaEngine,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  CryptoLock - OpenPGP key registry");
    info!("======================================");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"));
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("CORS origins: {}", args.cors_origins);
    info!("Max body: {} bytes", args.max_body_bytes);
    info!(
        "Empty passphrase on generation: {}",
        if args.allow_unprotected_keys { "unprotected key" } else { "rejected" }
    );
    info!("======================================");

    let directory = connect_directory(&args).await?;
    info!("User directory: {}", directory.backend());

    let audit = AuditLogger::new(args.node_id.to_string());
    if let Some(path) = &args.audit_log_path {
        if let Err(e) = audit.init_file(path.clone()).await {
            error!("Failed to open audit log {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    let engine = Arc::new(SequoiaEngine::new());
    let state = Arc::new(AppState::new(args, engine, directory, audit));

    server::run(state).await?;
    Ok(())
}

/// MongoDB when configured, in-memory otherwise.
///
/// In dev mode an unreachable MongoDB falls back to memory instead of
/// failing startup.
async fn connect_directory(args: &Args) -> anyhow::Result<Arc<dyn UserDirectory>> {
    let Some(uri) = &args.mongodb_uri else {
        warn!("MONGODB_URI not set, users are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryUserDirectory::new()));
    };

    let connected = match MongoClient::new(uri, &args.mongodb_db).await {
        Ok(client) => MongoUserDirectory::new(&client).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(directory) => {
            info!("MongoDB connected successfully");
            Ok(Arc::new(directory))
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory directory): {}", e);
            Ok(Arc::new(MemoryUserDirectory::new()))
        }
        Err(e) => Err(anyhow::anyhow!("MongoDB connection failed: {e}")),
    }
}

//! Configuration for CryptoLock
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

use crate::logging::LogFormat;
use crate::types::{CryptoLockError, Result};

/// CryptoLock - custodial OpenPGP key registry and message encryption service
#[derive(Parser, Debug, Clone)]
#[command(name = "cryptolock")]
#[command(about = "OpenPGP key registry and message encryption service")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI. Without it users are kept in memory.
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "cryptolock")]
    pub mongodb_db: String,

    /// Development mode: fall back to the in-memory directory when MongoDB
    /// is unreachable instead of exiting
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Comma-separated allowed CORS origins ("*" allows any)
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:5173,http://127.0.0.1:5173"
    )]
    pub cors_origins: String,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,

    /// Whether key generation with an empty passphrase produces an
    /// unprotected private key (true) or is refused (false)
    #[arg(
        long,
        env = "ALLOW_UNPROTECTED_KEYS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub allow_unprotected_keys: bool,

    /// Append audit events as JSONL to this file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,
}

/// Allowed CORS origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// The `Access-Control-Allow-Origin` value for a request from `origin`
    pub fn allow(&self, origin: Option<&str>) -> Option<String> {
        match self {
            Self::Any => Some("*".to_string()),
            Self::List(list) => origin
                .filter(|o| list.iter().any(|allowed| allowed == o))
                .map(str::to_string),
        }
    }
}

impl Args {
    /// Parse the configured CORS origins
    pub fn cors_origin_list(&self) -> CorsOrigins {
        let origins: Vec<String> = self
            .cors_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(CryptoLockError::Config(
                "MAX_BODY_BYTES must be greater than zero".into(),
            ));
        }

        if let CorsOrigins::List(origins) = self.cors_origin_list() {
            for origin in origins {
                let valid = (origin.starts_with("http://") || origin.starts_with("https://"))
                    && origin.split("://").nth(1).is_some_and(|host| !host.is_empty());
                if !valid {
                    return Err(CryptoLockError::Config(format!("Invalid CORS origin: {origin}")));
                }
            }
        }

        Ok(())
    }
}

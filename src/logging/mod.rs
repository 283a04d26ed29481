//! Logging infrastructure for CryptoLock
//!
//! Subscriber setup for the binary plus the key lifecycle audit trail.

pub mod audit;

pub use audit::{AuditEvent, AuditLogger, EventType, Outcome};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the process log
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `level` and
/// everything else at `info`.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cryptolock={level},info")));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

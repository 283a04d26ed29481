//! Audit trail for key lifecycle operations
//!
//! Every user-facing operation produces one [`AuditEvent`]. Events are
//! always emitted on the `cryptolock::audit` tracing target and, when a
//! path is configured, appended to a JSONL file.
//!
//! Events carry usernames, outcomes and sizes. They never carry key
//! material, passphrases or message contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::types::CryptoLockError;

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserCreated,
    PublicKeyUploaded,
    KeysGenerated,
    MessageEncrypted,
    MessageDecrypted,
}

/// How an operation ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Refused because of the caller's input (4xx)
    Rejected,
    /// Server-side failure (5xx)
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Instance that handled the request
    pub node_id: String,
    pub username: Option<String>,
    pub outcome: Outcome,
    /// Error detail for unsuccessful outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Payload size (message, ciphertext or key) in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

impl AuditEvent {
    pub fn new(event_type: EventType, node_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            node_id,
            username: None,
            outcome: Outcome::Success,
            detail: None,
            bytes: None,
        }
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes as u64);
        self
    }

    /// Record the error an operation ended with
    pub fn with_error(mut self, err: &CryptoLockError) -> Self {
        self.outcome = if err.is_client_error() {
            Outcome::Rejected
        } else {
            Outcome::Failed
        };
        self.detail = Some(err.to_string());
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that emits events to tracing and an optional JSONL file
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
    node_id: String,
}

struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl AuditLogger {
    pub fn new(node_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLoggerInner { writer: None })),
            node_id,
        }
    }

    /// Append events to the JSONL file at `path`
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Start an event stamped with this node's id
    pub fn event(&self, event_type: EventType) -> AuditEvent {
        AuditEvent::new(event_type, self.node_id.clone())
    }

    /// Record `event`, or its failure when `result` is an error
    pub async fn record<T>(&self, event: AuditEvent, result: &Result<T, CryptoLockError>) {
        let event = match result {
            Ok(_) => event,
            Err(e) => event.with_error(e),
        };
        self.log(event).await;
    }

    pub async fn log(&self, event: AuditEvent) {
        info!(
            target: "cryptolock::audit",
            event_type = ?event.event_type,
            username = event.username.as_deref().unwrap_or("-"),
            outcome = ?event.outcome,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );

        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }
}

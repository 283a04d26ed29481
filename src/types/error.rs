//! Error types for CryptoLock
//!
//! Every variant's `Display` output is the `detail` string returned to the
//! caller, so messages must never carry key material or plaintext.

use hyper::StatusCode;

/// Main error type for CryptoLock operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoLockError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Uploaded key appears to be a private key; please upload the public key only")]
    PrivateKeyUpload,

    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Private key is passphrase-protected; passphrase required")]
    PassphraseRequired,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("{0}")]
    NotFound(String),

    /// Username taken, or public key already set
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CryptoLockError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::InvalidPublicKey(_)
            | Self::PrivateKeyUpload
            | Self::InvalidCiphertext(_)
            | Self::InvalidPrivateKey(_)
            | Self::PassphraseRequired
            | Self::DecryptionFailed(_)
            | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Database(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when the caller's input caused the failure (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Convert to status code and detail tuple for HTTP response
    pub fn into_status_code_and_detail(self) -> (StatusCode, String) {
        let status = self.status_code();
        let detail = self.to_string();
        (status, detail)
    }
}

impl From<std::io::Error> for CryptoLockError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoLockError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for CryptoLock operations
pub type Result<T> = std::result::Result<T, CryptoLockError>;

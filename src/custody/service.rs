//! Key Service
//!
//! Orchestrates the custody steps against the user directory.
//!
//! # Responsibilities
//!
//! - Register users
//! - Validate and store uploaded public keys (once per user)
//! - Generate keypairs, storing the public half and handing back the private half
//! - Encrypt to stored public keys
//! - Decrypt with caller-supplied private keys
//!
//! Engine work runs on the blocking thread pool. Every operation records
//! one audit event.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::db::{User, UserDirectory};
use crate::logging::{AuditLogger, EventType};
use crate::pgp::OpenPgpEngine;
use crate::types::{CryptoLockError, Result};

use super::decrypt::{decrypt_message, DecryptRequest};
use super::encrypt::encrypt_for_recipient;
use super::generate::{generate_keys, GeneratedKeys, KeyGenPolicy};
use super::validate::validate_public_upload;

/// Owned inputs of a decrypt call, moved onto the blocking pool.
pub struct DecryptInput {
    pub username: String,
    pub ciphertext_armored: String,
    pub private_key_armored: Zeroizing<String>,
    pub passphrase: Option<Zeroizing<String>>,
}

// =============================================================================
// Key Service
// =============================================================================

pub struct KeyService<E: OpenPgpEngine> {
    engine: Arc<E>,
    directory: Arc<dyn UserDirectory>,
    policy: KeyGenPolicy,
    audit: AuditLogger,
}

impl<E: OpenPgpEngine> KeyService<E> {
    pub fn new(
        engine: Arc<E>,
        directory: Arc<dyn UserDirectory>,
        policy: KeyGenPolicy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            engine,
            directory,
            policy,
            audit,
        }
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Run engine work off the async executor
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&E) -> Result<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(engine.as_ref()))
            .await
            .map_err(|e| CryptoLockError::Internal(format!("Engine task failed: {e}")))?
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    pub async fn create_user(&self, username: &str) -> Result<User> {
        let result = self.create_user_inner(username).await;
        self.audit
            .record(self.audit.event(EventType::UserCreated).with_username(username), &result)
            .await;
        result
    }

    async fn create_user_inner(&self, username: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(CryptoLockError::BadRequest("Username must not be empty".into()));
        }
        if username.contains('/') {
            return Err(CryptoLockError::BadRequest(
                "Username must not contain '/'".into(),
            ));
        }
        if username.chars().any(char::is_control) {
            return Err(CryptoLockError::BadRequest(
                "Username must not contain control characters".into(),
            ));
        }
        let user = self.directory.create(username).await?;
        info!(username = %user.username, id = %user.id, "User registered");
        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Public keys
    // -------------------------------------------------------------------------

    /// Validate `file` as a public key and store it for `username`.
    ///
    /// Validation happens before the user lookup, so invalid content is a
    /// 400 even for unknown users, and nothing is written on rejection.
    pub async fn upload_public_key(&self, username: &str, file: &[u8]) -> Result<()> {
        let result = self.upload_public_key_inner(username, file).await;
        self.audit
            .record(
                self.audit
                    .event(EventType::PublicKeyUploaded)
                    .with_username(username)
                    .with_bytes(file.len()),
                &result,
            )
            .await;
        result
    }

    async fn upload_public_key_inner(&self, username: &str, file: &[u8]) -> Result<()> {
        if file.is_empty() {
            return Err(CryptoLockError::BadRequest("Empty file".into()));
        }
        let text = std::str::from_utf8(file)
            .map_err(|e| CryptoLockError::InvalidPublicKey(format!("not UTF-8 text: {e}")))?;

        let material = validate_public_upload(self.engine.as_ref(), text)?;
        self.directory
            .set_public_key(username, material.as_str())
            .await?;

        info!(username = %username, "Public key stored");
        Ok(())
    }

    pub async fn public_key(&self, username: &str) -> Result<String> {
        self.directory
            .find(username)
            .await?
            .and_then(|user| user.public_key)
            .ok_or_else(|| CryptoLockError::NotFound("Public key not found".into()))
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Generate a keypair for an existing user without a key.
    ///
    /// The public half is stored with the same conditional write as uploads;
    /// if another request stored a key first, that request wins and the
    /// freshly generated pair is discarded. Store failures never return the
    /// private key.
    pub async fn generate_keys(
        &self,
        username: &str,
        passphrase: Zeroizing<String>,
    ) -> Result<GeneratedKeys> {
        let result = self.generate_keys_inner(username, passphrase).await;
        let mut event = self.audit.event(EventType::KeysGenerated).with_username(username);
        if let Ok(keys) = &result {
            event = event.with_bytes(keys.private.len());
        }
        self.audit.record(event, &result).await;
        result
    }

    async fn generate_keys_inner(
        &self,
        username: &str,
        passphrase: Zeroizing<String>,
    ) -> Result<GeneratedKeys> {
        let user = self
            .directory
            .find(username)
            .await?
            .ok_or_else(|| CryptoLockError::NotFound("User not found".into()))?;
        if user.public_key.is_some() {
            return Err(CryptoLockError::Conflict("Public key already exists".into()));
        }
        self.policy.check_passphrase(&passphrase)?;

        let policy = self.policy.clone();
        let owner = username.to_string();
        let keys = self
            .blocking(move |engine| generate_keys(engine, &policy, &owner, &passphrase))
            .await?;

        match self
            .directory
            .set_public_key(username, keys.public.as_str())
            .await
        {
            Ok(()) => {
                info!(username = %username, protected = keys.protected, "Generated and stored keypair");
                Ok(keys)
            }
            Err(err @ (CryptoLockError::Conflict(_) | CryptoLockError::NotFound(_))) => {
                debug!(username = %username, "Lost public key race, discarding generated keypair");
                Err(err)
            }
            Err(err) => {
                warn!(username = %username, error = %err, "Failed to store generated public key");
                Err(CryptoLockError::Internal(format!(
                    "Key generation failed: could not store public key: {err}"
                )))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    pub async fn encrypt(&self, recipient: &str, message: String) -> Result<String> {
        let bytes = message.len();
        let result = self.encrypt_inner(recipient, message).await;
        self.audit
            .record(
                self.audit
                    .event(EventType::MessageEncrypted)
                    .with_username(recipient)
                    .with_bytes(bytes),
                &result,
            )
            .await;
        result
    }

    async fn encrypt_inner(&self, recipient: &str, message: String) -> Result<String> {
        let stored = self
            .directory
            .find(recipient)
            .await?
            .and_then(|user| user.public_key)
            .ok_or_else(|| CryptoLockError::NotFound("Recipient public key not found".into()))?;

        let message = Zeroizing::new(message);
        self.blocking(move |engine| encrypt_for_recipient(engine, &stored, &message))
            .await
    }

    /// Decrypt with caller-supplied key material.
    ///
    /// `username` is informational only; the key the caller sends decides
    /// what can be decrypted.
    pub async fn decrypt(&self, input: DecryptInput) -> Result<Zeroizing<String>> {
        let event = self
            .audit
            .event(EventType::MessageDecrypted)
            .with_username(&input.username)
            .with_bytes(input.ciphertext_armored.len());

        let result = self
            .blocking(move |engine| {
                let request = DecryptRequest {
                    ciphertext_armored: &input.ciphertext_armored,
                    private_key_armored: &input.private_key_armored,
                    passphrase: input.passphrase.as_deref().map(String::as_str),
                };
                decrypt_message(engine, &request).map(Zeroizing::new)
            })
            .await;

        self.audit.record(event, &result).await;
        result
    }
}

// =============================================================================
// Tests
// =============================================================================

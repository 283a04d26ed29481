//! Keypair generation.
//!
//! Generation is pure: it produces both armored halves and never touches
//! the directory. Storing the public half is the caller's job (see
//! [`KeyService::generate_keys`](super::KeyService::generate_keys)).

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::pgp::{
    Compression, HashAlgorithm, IdentityBinding, KeyAlgorithm, OpenPgpEngine, SymmetricCipher,
    UsageFlags,
};
use crate::types::{CryptoLockError, Result};

use super::validate::PublicKeyMaterial;

/// Domain used for the email address of generated identities
pub const IDENTITY_EMAIL_DOMAIN: &str = "example.com";

// =============================================================================
// Policy
// =============================================================================

/// Parameters every generated key is created with.
#[derive(Debug, Clone)]
pub struct KeyGenPolicy {
    pub algorithm: KeyAlgorithm,
    pub bits: u32,
    pub usage: UsageFlags,
    pub hashes: Vec<HashAlgorithm>,
    pub ciphers: Vec<SymmetricCipher>,
    pub compression: Vec<Compression>,

    /// Cipher used to lock secret material under the passphrase
    pub protection_cipher: SymmetricCipher,

    /// Hash used for the passphrase S2K
    pub protection_hash: HashAlgorithm,

    /// Whether an empty passphrase yields an unprotected key (true) or is
    /// rejected (false)
    pub allow_unprotected: bool,
}

impl Default for KeyGenPolicy {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaEncryptOrSign,
            bits: 2048,
            usage: UsageFlags::all(),
            hashes: vec![HashAlgorithm::Sha256],
            ciphers: vec![SymmetricCipher::Aes256],
            compression: vec![Compression::Zlib],
            protection_cipher: SymmetricCipher::Aes256,
            protection_hash: HashAlgorithm::Sha256,
            allow_unprotected: true,
        }
    }
}

impl KeyGenPolicy {
    pub fn with_allow_unprotected(mut self, allow: bool) -> Self {
        self.allow_unprotected = allow;
        self
    }

    /// The single identity bound to a key generated for `username`.
    pub fn identity_for(&self, username: &str) -> IdentityBinding {
        IdentityBinding {
            name: username.to_string(),
            email: format!("{username}@{IDENTITY_EMAIL_DOMAIN}"),
            usage: self.usage,
            hashes: self.hashes.clone(),
            ciphers: self.ciphers.clone(),
            compression: self.compression.clone(),
        }
    }

    /// Refuse an empty passphrase when unprotected keys are not allowed.
    pub fn check_passphrase(&self, passphrase: &str) -> Result<()> {
        if passphrase.is_empty() && !self.allow_unprotected {
            return Err(CryptoLockError::BadRequest(
                "Passphrase required to protect the generated key".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Output
// =============================================================================

/// Armored private key handed to the caller; zeroized on drop.
pub struct PrivateKeyMaterial(Zeroizing<String>);

impl PrivateKeyMaterial {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKeyMaterial")
            .field(&format_args!("<{} bytes redacted>", self.0.len()))
            .finish()
    }
}

#[derive(Debug)]
pub struct GeneratedKeys {
    pub public: PublicKeyMaterial,
    pub private: PrivateKeyMaterial,
    pub protected: bool,
}

// =============================================================================
// Generation
// =============================================================================

/// Generate a keypair for `username`.
///
/// A non-empty `passphrase` locks the secret material with the policy's
/// protection cipher and hash. An empty one leaves it unprotected when the
/// policy allows that, and is rejected otherwise.
pub fn generate_keys<E: OpenPgpEngine>(
    engine: &E,
    policy: &KeyGenPolicy,
    username: &str,
    passphrase: &str,
) -> Result<GeneratedKeys> {
    policy.check_passphrase(passphrase)?;

    let failed = |e: crate::pgp::EngineError| {
        CryptoLockError::Internal(format!("Key generation failed: {e}"))
    };

    let key = engine
        .generate_keypair(policy.algorithm, policy.bits)
        .map_err(failed)?;
    let key = engine
        .bind_identity(key, &policy.identity_for(username))
        .map_err(failed)?;

    let protected = !passphrase.is_empty();
    let key = if protected {
        engine
            .protect(
                key,
                passphrase,
                policy.protection_cipher,
                policy.protection_hash,
            )
            .map_err(failed)?
    } else {
        warn!(username = %username, "Generating unprotected private key (empty passphrase)");
        key
    };

    let public = engine.armor_public(&key).map_err(failed)?;
    let private = Zeroizing::new(engine.armor_private(&key).map_err(failed)?);

    debug!(username = %username, bits = policy.bits, protected, "Generated keypair");

    Ok(GeneratedKeys {
        public: PublicKeyMaterial::from_engine(&public),
        private: PrivateKeyMaterial(private),
        protected,
    })
}

//! OpenPGP engine capability
//!
//! The custody pipeline never touches an OpenPGP library directly. It talks
//! to an [`OpenPgpEngine`], which parses and serializes armored keys and
//! messages, generates keypairs, and performs encryption, decryption and
//! passphrase unlock. [`SequoiaEngine`] is the implementation used by the
//! server.
//!
//! # Unlock scoping
//!
//! Decrypted secret key state is represented by [`OpenPgpEngine::Unlocked`],
//! an owned value produced by [`OpenPgpEngine::unlock`] (protected keys) or
//! [`OpenPgpEngine::open`] (unprotected keys). Dropping it discards the
//! plaintext secret material, so callers bound its lifetime to a single
//! decrypt call.

pub mod sequoia;

#[cfg(test)]
pub(crate) mod fake;

pub use sequoia::SequoiaEngine;

/// Errors reported by an OpenPGP engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Generate(String),

    #[error("{0}")]
    Serialize(String),

    #[error("{0}")]
    Encrypt(String),

    #[error("{0}")]
    Unlock(String),

    #[error("{0}")]
    Decrypt(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Public key algorithm for generated keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA usable for both signing and encryption
    RsaEncryptOrSign,
}

/// Capabilities advertised on an identity binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageFlags {
    pub sign: bool,
    pub encrypt_communications: bool,
    pub encrypt_storage: bool,
}

impl UsageFlags {
    /// Sign + encrypt communications + encrypt storage
    pub const fn all() -> Self {
        Self {
            sign: true,
            encrypt_communications: true,
            encrypt_storage: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetricCipher {
    Aes128,
    Aes256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Zip,
    Zlib,
}

/// A user identity to bind onto a freshly generated key
#[derive(Debug, Clone)]
pub struct IdentityBinding {
    pub name: String,
    pub email: String,
    pub usage: UsageFlags,
    pub hashes: Vec<HashAlgorithm>,
    pub ciphers: Vec<SymmetricCipher>,
    pub compression: Vec<Compression>,
}

/// Properties a parsed key reports about itself
pub trait KeyInfo {
    /// Carries secret key material
    fn is_private(&self) -> bool;

    /// Carries secret key material that is encrypted under a passphrase
    fn is_protected(&self) -> bool;

    /// Has at least one key that is valid for encryption right now
    fn can_encrypt(&self) -> bool;
}

/// The OpenPGP operations the custody pipeline relies on.
pub trait OpenPgpEngine: Send + Sync + 'static {
    /// A parsed key, public or secret
    type Key: KeyInfo + Send;

    /// A parsed, still encrypted message
    type Message: Send;

    /// Secret key state usable for decryption; discarded on drop
    type Unlocked: Send;

    fn parse_key(&self, armored: &str) -> EngineResult<Self::Key>;

    fn parse_message(&self, armored: &str) -> EngineResult<Self::Message>;

    fn generate_keypair(&self, algorithm: KeyAlgorithm, bits: u32) -> EngineResult<Self::Key>;

    fn bind_identity(&self, key: Self::Key, identity: &IdentityBinding) -> EngineResult<Self::Key>;

    fn protect(
        &self,
        key: Self::Key,
        passphrase: &str,
        cipher: SymmetricCipher,
        hash: HashAlgorithm,
    ) -> EngineResult<Self::Key>;

    /// Armored public half of `key`
    fn armor_public(&self, key: &Self::Key) -> EngineResult<String>;

    /// Armored secret key block; fails for keys without secret material
    fn armor_private(&self, key: &Self::Key) -> EngineResult<String>;

    /// Encrypt `plaintext` to `recipient`, returning an armored message
    fn encrypt(&self, recipient: &Self::Key, plaintext: &str) -> EngineResult<String>;

    /// Decrypt the secret material of a protected key
    fn unlock(&self, key: &Self::Key, passphrase: &str) -> EngineResult<Self::Unlocked>;

    /// Make the secret material of an unprotected key usable
    fn open(&self, key: &Self::Key) -> EngineResult<Self::Unlocked>;

    /// Decrypt `message`, returning the literal payload
    fn decrypt(&self, key: &mut Self::Unlocked, message: &Self::Message) -> EngineResult<Vec<u8>>;
}

//! Public key upload validation.

use crate::armor;
use crate::pgp::{KeyInfo, OpenPgpEngine};
use crate::types::{CryptoLockError, Result};

/// A normalized armored public key that parsed cleanly and carries no
/// secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    armored: String,
}

impl PublicKeyMaterial {
    /// Wrap armor produced by the engine itself, e.g. a freshly generated key.
    pub(crate) fn from_engine(armored: &str) -> Self {
        Self {
            armored: armor::normalize(armored),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.armored
    }
}

/// Check that `armored` is usable as a stored public key.
///
/// Must run before anything is written to the directory. Parse failures
/// carry the engine diagnostic; keys holding secret material (encrypted or
/// not) are refused outright so a user who picked the wrong file does not
/// leak their private key to the server. Keys that nothing could ever be
/// encrypted to are refused too, since the stored key cannot be replaced.
pub fn validate_public_upload<E: OpenPgpEngine>(
    engine: &E,
    armored: &str,
) -> Result<PublicKeyMaterial> {
    let normalized = armor::normalize(armored);
    if armor::is_blank(&normalized) {
        return Err(CryptoLockError::InvalidPublicKey("no key data".into()));
    }

    let key = engine
        .parse_key(&normalized)
        .map_err(|e| CryptoLockError::InvalidPublicKey(e.to_string()))?;

    if key.is_private() || key.is_protected() {
        return Err(CryptoLockError::PrivateKeyUpload);
    }
    if !key.can_encrypt() {
        return Err(CryptoLockError::InvalidPublicKey(
            "no usable encryption key".into(),
        ));
    }

    Ok(PublicKeyMaterial {
        armored: normalized,
    })
}

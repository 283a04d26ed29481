//! Encryption to a stored public key.

use crate::armor;
use crate::pgp::OpenPgpEngine;
use crate::types::{CryptoLockError, Result};

/// Encrypt `plaintext` to the recipient whose stored armor is
/// `stored_public_key`, returning an armored PGP message.
///
/// The stored key passed validation on the way in, so failures here point
/// at server state rather than the caller and are reported as internal
/// errors.
pub fn encrypt_for_recipient<E: OpenPgpEngine>(
    engine: &E,
    stored_public_key: &str,
    plaintext: &str,
) -> Result<String> {
    let key = engine
        .parse_key(&armor::normalize(stored_public_key))
        .map_err(|e| {
            CryptoLockError::Internal(format!("Failed to parse recipient public key: {e}"))
        })?;

    engine
        .encrypt(&key, plaintext)
        .map_err(|e| CryptoLockError::Internal(format!("Encryption failed: {e}")))
}

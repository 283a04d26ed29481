//! Decryption with caller-supplied private keys.
//!
//! The request pipeline, in order:
//!
//! 1. Normalize the ciphertext and private key; blank input is a missing field
//! 2. Parse the ciphertext, then the private key
//! 3. A protected key needs a passphrase (presence, not non-emptiness)
//! 4. Unlock (or open) the key for exactly one decrypt call
//! 5. The payload must be UTF-8
//!
//! Everything that goes wrong in steps 4 and 5 depends on what the caller
//! sent, so it is a [`CryptoLockError::DecryptionFailed`] (400), never an
//! internal error.

use tracing::trace;
use zeroize::Zeroizing;

use crate::armor;
use crate::pgp::{EngineResult, KeyInfo, OpenPgpEngine};
use crate::types::{CryptoLockError, Result};

/// Inputs of a single decrypt call.
pub struct DecryptRequest<'a> {
    pub ciphertext_armored: &'a str,
    pub private_key_armored: &'a str,
    pub passphrase: Option<&'a str>,
}

impl std::fmt::Debug for DecryptRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptRequest")
            .field("ciphertext_len", &self.ciphertext_armored.len())
            .field("private_key_len", &self.private_key_armored.len())
            .field("passphrase", &self.passphrase.map(|_| "<redacted>"))
            .finish()
    }
}

/// Run `f` against the usable secret state of `key`.
///
/// The unlocked state is owned by this frame, so it is dropped when `f`
/// returns, errors or unwinds. A passphrase selects [`OpenPgpEngine::unlock`],
/// its absence [`OpenPgpEngine::open`].
pub fn with_unlocked<E, T, F>(
    engine: &E,
    key: &E::Key,
    passphrase: Option<&str>,
    f: F,
) -> EngineResult<T>
where
    E: OpenPgpEngine,
    F: FnOnce(&E, &mut E::Unlocked) -> EngineResult<T>,
{
    let mut unlocked = match passphrase {
        Some(passphrase) => engine.unlock(key, passphrase)?,
        None => engine.open(key)?,
    };
    f(engine, &mut unlocked)
}

/// Decrypt a message with caller-supplied key material.
pub fn decrypt_message<E: OpenPgpEngine>(engine: &E, request: &DecryptRequest<'_>) -> Result<String> {
    let ciphertext = armor::normalize(request.ciphertext_armored);
    if armor::is_blank(&ciphertext) {
        return Err(CryptoLockError::BadRequest("Missing ciphertext".into()));
    }
    let private_key = Zeroizing::new(armor::normalize(request.private_key_armored));
    if armor::is_blank(&private_key) {
        return Err(CryptoLockError::BadRequest("Missing private key".into()));
    }

    let message = engine
        .parse_message(&ciphertext)
        .map_err(|e| CryptoLockError::InvalidCiphertext(e.to_string()))?;
    let key = engine
        .parse_key(&private_key)
        .map_err(|e| CryptoLockError::InvalidPrivateKey(e.to_string()))?;

    // Unprotected keys ignore any passphrase that was sent along.
    let passphrase = if key.is_protected() {
        Some(request.passphrase.ok_or(CryptoLockError::PassphraseRequired)?)
    } else {
        None
    };

    let payload = with_unlocked(engine, &key, passphrase, |engine, unlocked| {
        engine.decrypt(unlocked, &message)
    })
    .map_err(|e| CryptoLockError::DecryptionFailed(e.to_string()))?;
    trace!(bytes = payload.len(), "Decrypted message payload");

    String::from_utf8(payload)
        .map_err(|_| CryptoLockError::DecryptionFailed("plaintext is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgp::fake::FakeEngine;

    fn request<'a>(
        ciphertext: &'a str,
        private_key: &'a str,
        passphrase: Option<&'a str>,
    ) -> DecryptRequest<'a> {
        DecryptRequest {
            ciphertext_armored: ciphertext,
            private_key_armored: private_key,
            passphrase,
        }
    }

    #[test]
    fn test_missing_fields() {
        let engine = FakeEngine::new();

        let err = decrypt_message(&engine, &request(" \r\n", "FAKE PRIVATE a", None)).unwrap_err();
        assert_eq!(err.to_string(), "Missing ciphertext");

        let err = decrypt_message(&engine, &request("FAKE MESSAGE a hi", "", None)).unwrap_err();
        assert_eq!(err.to_string(), "Missing private key");
    }

    #[test]
    fn test_parse_failures_are_classified() {
        let engine = FakeEngine::new();

        let err = decrypt_message(&engine, &request("garbage", "FAKE PRIVATE a", None)).unwrap_err();
        assert!(matches!(err, CryptoLockError::InvalidCiphertext(_)));

        let err = decrypt_message(&engine, &request("FAKE MESSAGE a hi", "garbage", None)).unwrap_err();
        assert!(matches!(err, CryptoLockError::InvalidPrivateKey(_)));
    }

    #[test]
    fn test_unprotected_key_decrypts() {
        let engine = FakeEngine::new();
        let plaintext =
            decrypt_message(&engine, &request("FAKE MESSAGE a hello", "FAKE PRIVATE a\r\n", None))
                .unwrap();
        assert_eq!(plaintext, "hello");

        // A stray passphrase does not matter for an unprotected key
        let plaintext = decrypt_message(
            &engine,
            &request("FAKE MESSAGE a hello", "FAKE PRIVATE a", Some("ignored")),
        )
        .unwrap();
        assert_eq!(plaintext, "hello");
        assert_eq!(engine.outstanding_unlocks(), 0);
    }

    #[test]
    fn test_protected_key_requires_passphrase_presence() {
        let engine = FakeEngine::new();
        let locked = "FAKE PRIVATE a LOCKED pw123";

        let err = decrypt_message(&engine, &request("FAKE MESSAGE a hi", locked, None)).unwrap_err();
        assert!(matches!(err, CryptoLockError::PassphraseRequired));

        // Present but empty is a wrong passphrase, not a missing one
        let err =
            decrypt_message(&engine, &request("FAKE MESSAGE a hi", locked, Some(""))).unwrap_err();
        assert!(matches!(err, CryptoLockError::DecryptionFailed(_)));
    }

    #[test]
    fn test_wrong_passphrase_is_decryption_failure() {
        let engine = FakeEngine::new();
        let err = decrypt_message(
            &engine,
            &request("FAKE MESSAGE a hi", "FAKE PRIVATE a LOCKED pw123", Some("nope")),
        )
        .unwrap_err();
        assert!(matches!(err, CryptoLockError::DecryptionFailed(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unlock_released_on_every_path() {
        let engine = FakeEngine::new();
        let locked = "FAKE PRIVATE a LOCKED pw123";

        decrypt_message(&engine, &request("FAKE MESSAGE a hi", locked, Some("pw123"))).unwrap();
        // Unlock succeeds but the message is for someone else
        decrypt_message(&engine, &request("FAKE MESSAGE b hi", locked, Some("pw123"))).unwrap_err();

        assert_eq!(engine.outstanding_unlocks(), 0);
        assert_eq!(
            engine.released.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
    }

    #[test]
    fn test_with_unlocked_drops_before_returning() {
        let engine = FakeEngine::new();
        let key = engine.parse_key("FAKE PRIVATE a").unwrap();

        let outstanding_inside =
            with_unlocked(&engine, &key, None, |engine, _| Ok(engine.outstanding_unlocks())).unwrap();
        assert_eq!(outstanding_inside, 1);
        assert_eq!(engine.outstanding_unlocks(), 0);
    }

    #[test]
    fn test_debug_redacts_inputs() {
        let req = request("FAKE MESSAGE a secret", "FAKE PRIVATE a", Some("pw123"));
        let rendered = format!("{req:?}");
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("pw123"));
    }
}

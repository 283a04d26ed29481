//! Deterministic stand-in engine for fast unit tests.
//!
//! Keys and messages are plain text lines:
//! - `FAKE PUBLIC <name>` / `FAKE PUBLIC <name> SIGNONLY`
//! - `FAKE PRIVATE <name>` / `FAKE PRIVATE <name> LOCKED <passphrase>`
//! - `FAKE MESSAGE <name> <plaintext>`
//!
//! Every dropped [`FakeUnlocked`] bumps [`FakeEngine::released`], which lets
//! tests observe that unlocked state never outlives a decrypt call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    EngineError, EngineResult, HashAlgorithm, IdentityBinding, KeyAlgorithm, KeyInfo,
    OpenPgpEngine, SymmetricCipher,
};

#[derive(Debug, Clone)]
pub struct FakeKey {
    name: String,
    private: bool,
    passphrase: Option<String>,
    sign_only: bool,
}

impl KeyInfo for FakeKey {
    fn is_private(&self) -> bool {
        self.private
    }

    fn is_protected(&self) -> bool {
        self.passphrase.is_some()
    }

    fn can_encrypt(&self) -> bool {
        !self.sign_only
    }
}

#[derive(Debug, Clone)]
pub struct FakeMessage {
    recipient: String,
    body: String,
}

pub struct FakeUnlocked {
    name: String,
    released: Arc<AtomicUsize>,
}

impl Drop for FakeUnlocked {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    pub unlocked: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub fail_generation: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_generation() -> Self {
        Self {
            fail_generation: true,
            ..Self::default()
        }
    }

    pub fn outstanding_unlocks(&self) -> usize {
        self.unlocked.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }

    fn hand_out(&self, name: &str) -> FakeUnlocked {
        self.unlocked.fetch_add(1, Ordering::SeqCst);
        FakeUnlocked {
            name: name.to_string(),
            released: Arc::clone(&self.released),
        }
    }
}

impl OpenPgpEngine for FakeEngine {
    type Key = FakeKey;
    type Message = FakeMessage;
    type Unlocked = FakeUnlocked;

    fn parse_key(&self, armored: &str) -> EngineResult<FakeKey> {
        let words: Vec<&str> = armored.split_whitespace().collect();
        match words.as_slice() {
            ["FAKE", "PUBLIC", name] => Ok(FakeKey {
                name: name.to_string(),
                private: false,
                passphrase: None,
                sign_only: false,
            }),
            ["FAKE", "PUBLIC", name, "SIGNONLY"] => Ok(FakeKey {
                name: name.to_string(),
                private: false,
                passphrase: None,
                sign_only: true,
            }),
            ["FAKE", "PRIVATE", name] => Ok(FakeKey {
                name: name.to_string(),
                private: true,
                passphrase: None,
                sign_only: false,
            }),
            ["FAKE", "PRIVATE", name, "LOCKED", passphrase] => Ok(FakeKey {
                name: name.to_string(),
                private: true,
                passphrase: Some(passphrase.to_string()),
                sign_only: false,
            }),
            _ => Err(EngineError::Parse("no key block found".into())),
        }
    }

    fn parse_message(&self, armored: &str) -> EngineResult<FakeMessage> {
        let mut parts = armored.trim_end().splitn(4, ' ');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("FAKE"), Some("MESSAGE"), Some(recipient), Some(body)) => Ok(FakeMessage {
                recipient: recipient.to_string(),
                body: body.to_string(),
            }),
            _ => Err(EngineError::Parse("no message found".into())),
        }
    }

    fn generate_keypair(&self, _algorithm: KeyAlgorithm, _bits: u32) -> EngineResult<FakeKey> {
        if self.fail_generation {
            return Err(EngineError::Generate("entropy source unavailable".into()));
        }
        Ok(FakeKey {
            name: String::new(),
            private: true,
            passphrase: None,
            sign_only: false,
        })
    }

    fn bind_identity(&self, mut key: FakeKey, identity: &IdentityBinding) -> EngineResult<FakeKey> {
        key.name = identity.name.clone();
        Ok(key)
    }

    fn protect(
        &self,
        mut key: FakeKey,
        passphrase: &str,
        _cipher: SymmetricCipher,
        _hash: HashAlgorithm,
    ) -> EngineResult<FakeKey> {
        key.passphrase = Some(passphrase.to_string());
        Ok(key)
    }

    fn armor_public(&self, key: &FakeKey) -> EngineResult<String> {
        Ok(format!("FAKE PUBLIC {}", key.name))
    }

    fn armor_private(&self, key: &FakeKey) -> EngineResult<String> {
        match &key.passphrase {
            Some(passphrase) => Ok(format!("FAKE PRIVATE {} LOCKED {}", key.name, passphrase)),
            None => Ok(format!("FAKE PRIVATE {}", key.name)),
        }
    }

    fn encrypt(&self, recipient: &FakeKey, plaintext: &str) -> EngineResult<String> {
        Ok(format!("FAKE MESSAGE {} {}", recipient.name, plaintext))
    }

    fn unlock(&self, key: &FakeKey, passphrase: &str) -> EngineResult<FakeUnlocked> {
        match &key.passphrase {
            Some(expected) if expected == passphrase => Ok(self.hand_out(&key.name)),
            _ => Err(EngineError::Unlock("incorrect passphrase".into())),
        }
    }

    fn open(&self, key: &FakeKey) -> EngineResult<FakeUnlocked> {
        if key.passphrase.is_some() {
            return Err(EngineError::Unlock("key is locked".into()));
        }
        Ok(self.hand_out(&key.name))
    }

    fn decrypt(&self, key: &mut FakeUnlocked, message: &FakeMessage) -> EngineResult<Vec<u8>> {
        if key.name != message.recipient {
            return Err(EngineError::Decrypt("no matching session key".into()));
        }
        Ok(message.body.clone().into_bytes())
    }
}

//! Sequoia-backed OpenPGP engine
//!
//! Uses the pure-Rust crypto backend of `sequoia-openpgp`. All operations
//! are evaluated under the standard policy, so keys and messages relying
//! on broken algorithms (SHA-1 signatures, short RSA moduli) are refused.

use std::io::{Read, Write};

use sequoia_openpgp as openpgp;

use openpgp::cert::prelude::*;
use openpgp::crypto::{KeyPair, Password, SessionKey};
use openpgp::packet::signature::SignatureBuilder;
use openpgp::packet::{UserID, PKESK, SKESK};
use openpgp::parse::stream::{
    DecryptionHelper, DecryptorBuilder, MessageStructure, VerificationHelper,
};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Armorer, Encryptor, LiteralWriter, Message};
use openpgp::serialize::SerializeInto;
use openpgp::types::{CompressionAlgorithm, KeyFlags, SignatureType, SymmetricAlgorithm};
use openpgp::{Cert, Fingerprint, KeyHandle, Packet};
use tracing::trace;

use super::{
    Compression, EngineError, EngineResult, HashAlgorithm, IdentityBinding, KeyAlgorithm,
    KeyInfo, OpenPgpEngine, SymmetricCipher, UsageFlags,
};

const POLICY: &StandardPolicy = &StandardPolicy::new();

/// A parsed certificate (transferable public or secret key)
#[derive(Debug, Clone)]
pub struct SequoiaKey {
    cert: Cert,
}

impl KeyInfo for SequoiaKey {
    fn is_private(&self) -> bool {
        self.cert.is_tsk()
    }

    fn is_protected(&self) -> bool {
        self.cert
            .keys()
            .secret()
            .any(|ka| ka.key().secret().is_encrypted())
    }

    fn can_encrypt(&self) -> bool {
        self.cert
            .keys()
            .with_policy(POLICY, None)
            .supported()
            .alive()
            .revoked(false)
            .key_flags(encryption_flags())
            .next()
            .is_some()
    }
}

/// A syntactically valid OpenPGP message, kept in its armored form
#[derive(Debug, Clone)]
pub struct SequoiaMessage {
    armored: Vec<u8>,
}

/// Decryption-capable secret keys with plaintext secret material.
///
/// The secret MPIs live in sequoia's protected memory and are zeroed when
/// the key pairs are dropped together with this value.
pub struct SequoiaUnlocked {
    pairs: Vec<KeyPair>,
}

impl Drop for SequoiaUnlocked {
    fn drop(&mut self) {
        let count = self.pairs.len();
        self.pairs.clear();
        trace!(keys = count, "Discarded unlocked secret keys");
    }
}

/// OpenPGP engine built on `sequoia-openpgp`
#[derive(Debug, Clone, Copy, Default)]
pub struct SequoiaEngine;

impl SequoiaEngine {
    pub fn new() -> Self {
        Self
    }
}

fn encryption_flags() -> KeyFlags {
    KeyFlags::empty()
        .set_transport_encryption()
        .set_storage_encryption()
}

fn key_flags(usage: UsageFlags) -> KeyFlags {
    let mut flags = KeyFlags::empty().set_certification();
    if usage.sign {
        flags = flags.set_signing();
    }
    if usage.encrypt_communications {
        flags = flags.set_transport_encryption();
    }
    if usage.encrypt_storage {
        flags = flags.set_storage_encryption();
    }
    flags
}

fn hash_algorithm(hash: HashAlgorithm) -> openpgp::types::HashAlgorithm {
    match hash {
        HashAlgorithm::Sha256 => openpgp::types::HashAlgorithm::SHA256,
        HashAlgorithm::Sha512 => openpgp::types::HashAlgorithm::SHA512,
    }
}

fn symmetric_algorithm(cipher: SymmetricCipher) -> SymmetricAlgorithm {
    match cipher {
        SymmetricCipher::Aes128 => SymmetricAlgorithm::AES128,
        SymmetricCipher::Aes256 => SymmetricAlgorithm::AES256,
    }
}

fn compression_algorithm(compression: Compression) -> CompressionAlgorithm {
    match compression {
        Compression::Uncompressed => CompressionAlgorithm::Uncompressed,
        Compression::Zip => CompressionAlgorithm::Zip,
        Compression::Zlib => CompressionAlgorithm::Zlib,
    }
}

/// Collect decryption key pairs, decrypting protected secrets with `password`.
fn decryption_keypairs(key: &SequoiaKey, password: Option<&Password>) -> EngineResult<Vec<KeyPair>> {
    let mut pairs = Vec::new();

    for ka in key
        .cert
        .keys()
        .with_policy(POLICY, None)
        .supported()
        .secret()
        .key_flags(encryption_flags())
    {
        let mut secret = ka.key().clone();
        if secret.secret().is_encrypted() {
            let password = password
                .ok_or_else(|| EngineError::Unlock("secret key is passphrase-protected".into()))?;
            secret = secret
                .decrypt_secret(password)
                .map_err(|e| EngineError::Unlock(e.to_string()))?;
        }
        pairs.push(
            secret
                .into_keypair()
                .map_err(|e| EngineError::Unlock(e.to_string()))?,
        );
    }

    if pairs.is_empty() {
        return Err(EngineError::Unlock(
            "key has no usable encryption-capable secret key".into(),
        ));
    }

    Ok(pairs)
}

impl OpenPgpEngine for SequoiaEngine {
    type Key = SequoiaKey;
    type Message = SequoiaMessage;
    type Unlocked = SequoiaUnlocked;

    fn parse_key(&self, armored: &str) -> EngineResult<SequoiaKey> {
        let cert =
            Cert::from_bytes(armored.as_bytes()).map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(SequoiaKey { cert })
    }

    fn parse_message(&self, armored: &str) -> EngineResult<SequoiaMessage> {
        openpgp::Message::from_bytes(armored.as_bytes())
            .map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(SequoiaMessage {
            armored: armored.as_bytes().to_vec(),
        })
    }

    fn generate_keypair(&self, algorithm: KeyAlgorithm, bits: u32) -> EngineResult<SequoiaKey> {
        let suite = match (algorithm, bits) {
            (KeyAlgorithm::RsaEncryptOrSign, 2048) => CipherSuite::RSA2k,
            (KeyAlgorithm::RsaEncryptOrSign, 3072) => CipherSuite::RSA3k,
            (KeyAlgorithm::RsaEncryptOrSign, 4096) => CipherSuite::RSA4k,
            (_, other) => {
                return Err(EngineError::Unsupported(format!("RSA modulus of {} bits", other)))
            }
        };

        let (cert, _revocation) = CertBuilder::new()
            .set_cipher_suite(suite)
            .set_primary_key_flags(key_flags(UsageFlags::all()))
            .generate()
            .map_err(|e| EngineError::Generate(e.to_string()))?;

        Ok(SequoiaKey { cert })
    }

    fn bind_identity(&self, key: SequoiaKey, identity: &IdentityBinding) -> EngineResult<SequoiaKey> {
        let generate_err = |e: anyhow::Error| EngineError::Generate(e.to_string());

        let cert = key.cert;
        let mut signer = cert
            .primary_key()
            .key()
            .clone()
            .parts_into_secret()
            .and_then(|secret| secret.into_keypair())
            .map_err(generate_err)?;

        let userid = UserID::from(format!("{} <{}>", identity.name, identity.email));
        let builder = SignatureBuilder::new(SignatureType::PositiveCertification)
            .set_hash_algo(openpgp::types::HashAlgorithm::SHA256)
            .set_key_flags(key_flags(identity.usage))
            .and_then(|b| {
                b.set_preferred_hash_algorithms(
                    identity.hashes.iter().copied().map(hash_algorithm).collect(),
                )
            })
            .and_then(|b| {
                b.set_preferred_symmetric_algorithms(
                    identity.ciphers.iter().copied().map(symmetric_algorithm).collect(),
                )
            })
            .and_then(|b| {
                b.set_preferred_compression_algorithms(
                    identity
                        .compression
                        .iter()
                        .copied()
                        .map(compression_algorithm)
                        .collect(),
                )
            })
            .and_then(|b| b.set_primary_userid(true))
            .map_err(generate_err)?;

        let binding = userid.bind(&mut signer, &cert, builder).map_err(generate_err)?;
        let cert = cert
            .insert_packets(vec![Packet::from(userid), Packet::from(binding)])
            .map_err(generate_err)?;

        Ok(SequoiaKey { cert })
    }

    fn protect(
        &self,
        key: SequoiaKey,
        passphrase: &str,
        cipher: SymmetricCipher,
        hash: HashAlgorithm,
    ) -> EngineResult<SequoiaKey> {
        // encrypt_secret uses AES-256 with an iterated+salted SHA-256 S2K
        if (cipher, hash) != (SymmetricCipher::Aes256, HashAlgorithm::Sha256) {
            return Err(EngineError::Unsupported(format!(
                "key protection with {:?}/{:?}",
                cipher, hash
            )));
        }

        let password = Password::from(passphrase);
        let mut packets: Vec<Packet> = Vec::new();
        for ka in key.cert.keys().secret() {
            let encrypted = ka
                .key()
                .clone()
                .encrypt_secret(&password)
                .map_err(|e| EngineError::Generate(e.to_string()))?;
            if ka.primary() {
                packets.push(encrypted.role_into_primary().into());
            } else {
                packets.push(encrypted.role_into_subordinate().into());
            }
        }

        let cert = key
            .cert
            .insert_packets(packets)
            .map_err(|e| EngineError::Generate(e.to_string()))?;

        Ok(SequoiaKey { cert })
    }

    fn armor_public(&self, key: &SequoiaKey) -> EngineResult<String> {
        let bytes = key
            .cert
            .armored()
            .to_vec()
            .map_err(|e| EngineError::Serialize(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    fn armor_private(&self, key: &SequoiaKey) -> EngineResult<String> {
        if !key.is_private() {
            return Err(EngineError::Serialize("key carries no secret material".into()));
        }
        let bytes = key
            .cert
            .as_tsk()
            .armored()
            .to_vec()
            .map_err(|e| EngineError::Serialize(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    fn encrypt(&self, recipient: &SequoiaKey, plaintext: &str) -> EngineResult<String> {
        let encrypt_err = |e: anyhow::Error| EngineError::Encrypt(e.to_string());

        let recipients: Vec<_> = recipient
            .cert
            .keys()
            .with_policy(POLICY, None)
            .supported()
            .alive()
            .revoked(false)
            .key_flags(encryption_flags())
            .collect();

        if recipients.is_empty() {
            return Err(EngineError::Encrypt(
                "recipient key has no valid encryption-capable key".into(),
            ));
        }

        let mut sink = Vec::new();
        {
            let message = Message::new(&mut sink);
            let message = Armorer::new(message).build().map_err(encrypt_err)?;
            let message = Encryptor::for_recipients(message, recipients)
                .build()
                .map_err(encrypt_err)?;
            let mut message = LiteralWriter::new(message).build().map_err(encrypt_err)?;
            message
                .write_all(plaintext.as_bytes())
                .map_err(|e| EngineError::Encrypt(e.to_string()))?;
            message.finalize().map_err(encrypt_err)?;
        }

        String::from_utf8(sink).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    fn unlock(&self, key: &SequoiaKey, passphrase: &str) -> EngineResult<SequoiaUnlocked> {
        let password = Password::from(passphrase);
        let pairs = decryption_keypairs(key, Some(&password))?;
        Ok(SequoiaUnlocked { pairs })
    }

    fn open(&self, key: &SequoiaKey) -> EngineResult<SequoiaUnlocked> {
        let pairs = decryption_keypairs(key, None)?;
        Ok(SequoiaUnlocked { pairs })
    }

    fn decrypt(&self, key: &mut SequoiaUnlocked, message: &SequoiaMessage) -> EngineResult<Vec<u8>> {
        let decrypt_err = |e: anyhow::Error| EngineError::Decrypt(e.to_string());

        let helper = Helper {
            pairs: &mut key.pairs,
        };
        let mut decryptor = DecryptorBuilder::from_bytes(&message.armored)
            .map_err(decrypt_err)?
            .with_policy(POLICY, None, helper)
            .map_err(decrypt_err)?;

        let mut plaintext = Vec::new();
        decryptor
            .read_to_end(&mut plaintext)
            .map_err(|e| EngineError::Decrypt(e.to_string()))?;

        Ok(plaintext)
    }
}

/// Feeds unlocked key pairs to the streaming decryptor
struct Helper<'a> {
    pairs: &'a mut [KeyPair],
}

impl VerificationHelper for Helper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        // Messages are not signed by this service
        Ok(Vec::new())
    }

    fn check(&mut self, _structure: MessageStructure) -> openpgp::Result<()> {
        Ok(())
    }
}

impl DecryptionHelper for Helper<'_> {
    fn decrypt<D>(
        &mut self,
        pkesks: &[PKESK],
        _skesks: &[SKESK],
        sym_algo: Option<SymmetricAlgorithm>,
        mut decrypt: D,
    ) -> openpgp::Result<Option<Fingerprint>>
    where
        D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool,
    {
        for pkesk in pkesks {
            for pair in self.pairs.iter_mut() {
                if let Some((algo, session_key)) = pkesk.decrypt(pair, sym_algo) {
                    if decrypt(algo, &session_key) {
                        return Ok(Some(pair.public().fingerprint()));
                    }
                }
            }
        }

        Err(anyhow::anyhow!("no supplied secret key can decrypt this message"))
    }
}

// =============================================================================
// Tests
// =============================================================================

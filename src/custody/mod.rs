//! Key custody pipeline
//!
//! The pieces that give the service its contracts: deciding which armored
//! blocks may be stored as a user's public key, generating keypairs under a
//! fixed policy, and the encrypt/decrypt request pipelines.
//!
//! # Architecture
//!
//! The step modules are synchronous and generic over [`OpenPgpEngine`]:
//! - [`validate`]: public key uploads, rejecting private key material
//! - [`generate`]: keypair generation, no persistence
//! - [`encrypt`]: encrypt to an already stored public key
//! - [`decrypt`]: decrypt with caller-supplied key material and a scoped unlock
//!
//! [`KeyService`] ties them to the [`UserDirectory`](crate::db::UserDirectory),
//! enforces preconditions and moves engine work onto the blocking pool.
//!
//! # Key material
//!
//! The service never holds private key material beyond a single call.
//! Generated private keys are returned in a [`PrivateKeyMaterial`] that
//! zeroizes its buffer on drop, and decryption unlocks keys only for the
//! duration of one [`OpenPgpEngine::decrypt`] call.
//!
//! [`OpenPgpEngine`]: crate::pgp::OpenPgpEngine
//! [`OpenPgpEngine::decrypt`]: crate::pgp::OpenPgpEngine::decrypt

pub mod decrypt;
pub mod encrypt;
pub mod generate;
pub mod service;
pub mod validate;

pub use decrypt::{decrypt_message, with_unlocked, DecryptRequest};
pub use encrypt::encrypt_for_recipient;
pub use generate::{generate_keys, GeneratedKeys, KeyGenPolicy, PrivateKeyMaterial};
pub use service::KeyService;
pub use validate::{validate_public_upload, PublicKeyMaterial};

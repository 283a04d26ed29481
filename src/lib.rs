//! CryptoLock - OpenPGP key registry and message encryption service
//!
//! Users register a username and either upload a public key or have the
//! service generate a keypair. Senders encrypt messages to a recipient's
//! stored public key; recipients decrypt by sending their own private key
//! (and passphrase) with the request. Private keys are never stored.
//!
//! ## Modules
//!
//! - **armor**: normalization of armored text blocks
//! - **pgp**: the OpenPGP engine capability and its sequoia implementation
//! - **custody**: validation, generation, encrypt and decrypt pipelines
//! - **db**: user directory (in-memory or MongoDB)
//! - **routes** / **server**: HTTP surface on hyper
//! - **logging**: tracing setup and the audit trail

pub mod armor;
pub mod config;
pub mod custody;
pub mod db;
pub mod logging;
pub mod pgp;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CryptoLockError, Result};

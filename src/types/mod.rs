//! Shared types for CryptoLock

pub mod error;

pub use error::{CryptoLockError, Result};

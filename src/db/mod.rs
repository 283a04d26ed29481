//! User directory
//!
//! Persists username to public-key associations behind the
//! [`UserDirectory`] trait:
//! - [`MemoryUserDirectory`]: process-local, used in development and tests
//! - [`MongoUserDirectory`]: MongoDB `users` collection
//!
//! Both implement the public key transition as a single conditional write,
//! so a key once set can never be replaced.

pub mod memory;
pub mod mongo;
pub mod schemas;

#[cfg(test)]
pub(crate) mod unavailable;

use serde::Serialize;

use crate::types::Result;

pub use memory::MemoryUserDirectory;
pub use mongo::{MongoClient, MongoCollection, MongoUserDirectory};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,

    /// Normalized armored public key, set at most once
    #[serde(skip_serializing)]
    pub public_key: Option<String>,
}

/// Persistence for users and their public keys.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by exact username
    async fn find(&self, username: &str) -> Result<Option<User>>;

    /// Register `username` with no public key.
    ///
    /// Fails with `Conflict("username exists")` if it is taken.
    async fn create(&self, username: &str) -> Result<User>;

    /// Store `armored` as the user's public key if none is set yet.
    ///
    /// Fails with `NotFound("User not found")` for unknown users and
    /// `Conflict("Public key already exists")` when a key is already stored.
    /// The check and the write are one atomic step.
    async fn set_public_key(&self, username: &str, armored: &str) -> Result<()>;

    /// Short backend name for health output
    fn backend(&self) -> &'static str;
}

pub(crate) const USERNAME_EXISTS: &str = "username exists";
pub(crate) const USER_NOT_FOUND: &str = "User not found";
pub(crate) const PUBLIC_KEY_EXISTS: &str = "Public key already exists";

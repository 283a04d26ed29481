//! Directory whose key writes always fail, for exercising store outages.

use super::{MemoryUserDirectory, User, UserDirectory};
use crate::types::{CryptoLockError, Result};

/// Reads and registrations go to an inner [`MemoryUserDirectory`];
/// `set_public_key` fails with a database error.
#[derive(Debug, Default)]
pub struct KeyWriteFailingDirectory {
    inner: MemoryUserDirectory,
}

impl KeyWriteFailingDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserDirectory for KeyWriteFailingDirectory {
    async fn find(&self, username: &str) -> Result<Option<User>> {
        self.inner.find(username).await
    }

    async fn create(&self, username: &str) -> Result<User> {
        self.inner.create(username).await
    }

    async fn set_public_key(&self, _username: &str, _armored: &str) -> Result<()> {
        Err(CryptoLockError::Database("connection reset by peer".into()))
    }

    fn backend(&self) -> &'static str {
        "unavailable"
    }
}

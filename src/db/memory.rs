//! In-memory user directory

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::{User, UserDirectory, PUBLIC_KEY_EXISTS, USERNAME_EXISTS, USER_NOT_FOUND};
use crate::types::{CryptoLockError, Result};

/// Process-local directory keyed by username.
///
/// The conditional key write runs while holding the shard write guard for
/// the username, which makes the check-then-set atomic.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, User>,
    next_id: AtomicU64,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.get(username).map(|user| user.value().clone()))
    }

    async fn create(&self, username: &str) -> Result<User> {
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(CryptoLockError::Conflict(USERNAME_EXISTS.into())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let user = User {
                    id: id.to_string(),
                    username: username.to_string(),
                    public_key: None,
                };
                slot.insert(user.clone());
                debug!(username = %username, id, "Created user");
                Ok(user)
            }
        }
    }

    async fn set_public_key(&self, username: &str, armored: &str) -> Result<()> {
        let mut user = self
            .users
            .get_mut(username)
            .ok_or_else(|| CryptoLockError::NotFound(USER_NOT_FOUND.into()))?;

        if user.public_key.is_some() {
            return Err(CryptoLockError::Conflict(PUBLIC_KEY_EXISTS.into()));
        }
        user.public_key = Some(armored.to_string());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

//! Database schemas for CryptoLock
//!
//! MongoDB document structures. Only users are persisted.

mod metadata;
mod user;

pub use metadata::Metadata;
pub use user::{UserDoc, USER_COLLECTION};

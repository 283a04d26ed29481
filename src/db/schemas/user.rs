//! User document schema
//!
//! Maps a unique username to its (optional, write-once) armored public key.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::User;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    pub username: String,

    /// Normalized armored public key. Serialized as `null` while unset so
    /// the conditional key write can filter on it.
    #[serde(default)]
    pub public_key: Option<String>,
}

impl UserDoc {
    /// Create a new user document without a public key
    pub fn new(username: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            username,
            public_key: None,
        }
    }

    pub fn into_user(self) -> User {
        User {
            id: self._id.map(|id| id.to_hex()).unwrap_or_default(),
            username: self.username,
            public_key: self.public_key,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "username": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_public_key_serializes_as_null() {
        let doc = bson::to_document(&UserDoc::new("alice".into())).unwrap();
        assert_eq!(doc.get("public_key"), Some(&bson::Bson::Null));
        assert!(doc.get("_id").is_none());
    }

    #[test]
    fn test_into_user() {
        let id = ObjectId::new();
        let doc = UserDoc {
            _id: Some(id),
            public_key: Some("KEY\n".into()),
            ..UserDoc::new("alice".into())
        };
        let user = doc.into_user();
        assert_eq!(user.id, id.to_hex());
        assert_eq!(user.username, "alice");
        assert_eq!(user.public_key.as_deref(), Some("KEY\n"));
    }

    #[test]
    fn test_username_index_is_unique() {
        let indices = UserDoc::into_indices();
        assert_eq!(indices.len(), 1);
        let (keys, opts) = &indices[0];
        assert_eq!(keys, &doc! { "username": 1 });
        assert_eq!(opts.as_ref().and_then(|o| o.unique), Some(true));
    }
}

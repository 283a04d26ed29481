//! MongoDB client, collection wrapper and the Mongo-backed user directory

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::{Metadata, UserDoc, USER_COLLECTION};
use crate::db::{User, UserDirectory, PUBLIC_KEY_EXISTS, USERNAME_EXISTS, USER_NOT_FOUND};
use crate::types::{CryptoLockError, Result};

/// MongoDB server error code for unique index violations
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

// =============================================================================
// Client
// =============================================================================

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the connection with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!(db = %db_name, "Connecting to MongoDB");

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CryptoLockError::Database(format!("Failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CryptoLockError::Database(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| CryptoLockError::Database(format!("Failed to create indexes: {e}")))?;

        Ok(())
    }

    /// Insert a document, stamping its metadata.
    ///
    /// Unique index violations come back as `Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        *item.mut_metadata() = Metadata::new();

        let result = self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                CryptoLockError::Conflict("duplicate key".into())
            } else {
                CryptoLockError::Database(format!("Insert failed: {e}"))
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CryptoLockError::Database("Failed to get inserted ID".into()))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| CryptoLockError::Database(format!("Find failed: {e}")))
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| CryptoLockError::Database(format!("Update failed: {e}")))
    }
}

// =============================================================================
// User directory
// =============================================================================

/// User directory on the `users` collection.
///
/// Usernames are protected by a unique index. The public key is written
/// with an `update_one` filtered on `public_key: null`, so of two racing
/// writers only one can match.
#[derive(Clone)]
pub struct MongoUserDirectory {
    users: MongoCollection<UserDoc>,
}

impl MongoUserDirectory {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let users = client.collection::<UserDoc>(USER_COLLECTION).await?;
        info!(db = %client.db_name(), collection = USER_COLLECTION, "User directory ready");
        Ok(Self { users })
    }
}

#[async_trait::async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find(&self, username: &str) -> Result<Option<User>> {
        let doc = self.users.find_one(doc! { "username": username }).await?;
        Ok(doc.map(UserDoc::into_user))
    }

    async fn create(&self, username: &str) -> Result<User> {
        let id = self
            .users
            .insert_one(UserDoc::new(username.to_string()))
            .await
            .map_err(|e| match e {
                CryptoLockError::Conflict(_) => CryptoLockError::Conflict(USERNAME_EXISTS.into()),
                other => other,
            })?;

        debug!(username = %username, id = %id, "Created user");

        Ok(User {
            id: id.to_hex(),
            username: username.to_string(),
            public_key: None,
        })
    }

    async fn set_public_key(&self, username: &str, armored: &str) -> Result<()> {
        let result = self
            .users
            .update_one(
                doc! { "username": username, "public_key": null },
                doc! {
                    "$set": {
                        "public_key": armored,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        if result.matched_count == 1 {
            return Ok(());
        }

        // Nothing matched: either the user is missing or the key is taken
        match self.find(username).await? {
            None => Err(CryptoLockError::NotFound(USER_NOT_FOUND.into())),
            Some(_) => Err(CryptoLockError::Conflict(PUBLIC_KEY_EXISTS.into())),
        }
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}

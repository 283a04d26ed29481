//! Common metadata for all documents

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Creation and update timestamps
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata stamped with the current time
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            updated_at: Some(now),
            created_at: Some(now),
        }
    }
}

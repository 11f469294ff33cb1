//! Collection paths in the document store

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Slash-separated path naming a document collection, e.g. `users/{uid}/uploads`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parse and validate a collection path
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "Collection path cannot be empty".to_string(),
            ));
        }
        if trimmed
            .split('/')
            .any(|segment| segment.trim().is_empty() || segment == "." || segment == "..")
        {
            return Err(Error::InvalidInput(format!(
                "Collection path has an empty or relative segment: {raw}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// A user's uploaded books
    pub fn uploads(user_id: &str) -> Result<Self> {
        Self::for_user(user_id, "uploads")
    }

    /// A user's reading list
    pub fn reading_list(user_id: &str) -> Result<Self> {
        Self::for_user(user_id, "reading_list")
    }

    /// The shared bestsellers feed
    #[must_use]
    pub fn bestsellers() -> Self {
        Self("bestsellers".to_string())
    }

    fn for_user(user_id: &str, leaf: &str) -> Result<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() || user_id.contains('/') {
            return Err(Error::InvalidInput(format!(
                "Invalid user id for collection path: {user_id:?}"
            )));
        }
        Self::parse(&format!("users/{user_id}/{leaf}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

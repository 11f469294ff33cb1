//! Item model: one document of a remote collection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for an item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Create a new unique item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A document in a remote collection.
///
/// Identity is `id`; `uploaded_at` is the sort key (Unix ms). Collections
/// order items newest first, breaking ties on `id` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,
    /// Sort key (Unix ms)
    pub uploaded_at: i64,
    /// Arbitrary payload
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Item {
    /// Create an item stamped with the current time
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            id: ItemId::new(),
            uploaded_at: crate::util::unix_millis_now(),
            fields,
        }
    }

    /// Read a string field, if present and a string
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Compare two items by collection order (newest first).
    ///
    /// `Ordering::Less` means `self` is listed before `other`.
    #[must_use]
    pub fn collection_order(&self, other: &Self) -> Ordering {
        other
            .uploaded_at
            .cmp(&self.uploaded_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_unique() {
        let id1 = ItemId::new();
        let id2 = ItemId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_item_id_parse() {
        let id = ItemId::new();
        let parsed: ItemId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_collection_order_newest_first() {
        let older = Item {
            id: ItemId::new(),
            uploaded_at: 100,
            fields: Map::new(),
        };
        let newer = Item {
            id: ItemId::new(),
            uploaded_at: 200,
            fields: Map::new(),
        };
        assert_eq!(newer.collection_order(&older), Ordering::Less);
        assert_eq!(older.collection_order(&newer), Ordering::Greater);
    }

    #[test]
    fn test_collection_order_breaks_ties_on_id() {
        let a = Item {
            id: ItemId(Uuid::from_u128(1)),
            uploaded_at: 100,
            fields: Map::new(),
        };
        let b = Item {
            id: ItemId(Uuid::from_u128(2)),
            uploaded_at: 100,
            fields: Map::new(),
        };
        assert_eq!(b.collection_order(&a), Ordering::Less);
    }
}

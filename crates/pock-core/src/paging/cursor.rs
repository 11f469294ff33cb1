//! Opaque pagination cursors handed out by remote collections

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Item, ItemId};

/// Opaque token for the position of the last item a page returned.
///
/// Clients only ever receive cursors from a collection and hand them back;
/// the encoded position is meaningful to collection implementations only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

/// Decoded cursor contents, used by collection implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    #[serde(rename = "k")]
    pub uploaded_at: i64,
    #[serde(rename = "i")]
    pub id: ItemId,
    /// Collection epoch the cursor was minted under
    #[serde(rename = "e")]
    pub epoch: u64,
}

impl CursorPosition {
    /// Position of `item` in a collection at `epoch`
    #[must_use]
    pub const fn of(item: &Item, epoch: u64) -> Self {
        Self {
            uploaded_at: item.uploaded_at,
            id: item.id,
            epoch,
        }
    }

    /// Whether `item` sorts strictly after this position (newest-first order)
    #[must_use]
    pub fn precedes(&self, item: &Item) -> bool {
        item.uploaded_at < self.uploaded_at
            || (item.uploaded_at == self.uploaded_at && item.id < self.id)
    }
}

impl Cursor {
    /// Encode a position into an opaque cursor
    pub(crate) fn encode(position: &CursorPosition) -> Result<Self> {
        let json = serde_json::to_vec(position)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decode the position; malformed tokens are `InvalidCursor`
    pub fn decode(&self) -> Result<CursorPosition> {
        let raw = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|error| Error::InvalidCursor(format!("undecodable cursor: {error}")))?;
        serde_json::from_slice(&raw)
            .map_err(|error| Error::InvalidCursor(format!("malformed cursor: {error}")))
    }

    /// Decode and check the cursor belongs to the collection's current epoch
    pub fn decode_for_epoch(&self, current_epoch: u64) -> Result<CursorPosition> {
        let position = self.decode()?;
        if position.epoch != current_epoch {
            return Err(Error::InvalidCursor(format!(
                "cursor from epoch {} but collection is at epoch {current_epoch}",
                position.epoch
            )));
        }
        Ok(position)
    }

    /// The opaque token text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.0).finish()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn item_at(uploaded_at: i64) -> Item {
        Item {
            id: ItemId::new(),
            uploaded_at,
            fields: Map::new(),
        }
    }

    #[test]
    fn test_cursor_decodes_its_position() {
        let item = item_at(1_700_000_000_000);
        let position = CursorPosition::of(&item, 3);
        let cursor = Cursor::encode(&position).unwrap();
        assert_eq!(cursor.decode().unwrap(), position);
    }

    #[test]
    fn test_garbage_token_is_invalid_cursor() {
        let error = Cursor("%%%".to_string()).decode().unwrap_err();
        assert!(error.requires_refresh());

        let not_json = Cursor(URL_SAFE_NO_PAD.encode(b"plain"));
        assert!(matches!(not_json.decode(), Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_stale_epoch_is_rejected() {
        let position = CursorPosition::of(&item_at(10), 0);
        let cursor = Cursor::encode(&position).unwrap();
        assert!(cursor.decode_for_epoch(0).is_ok());
        assert!(matches!(
            cursor.decode_for_epoch(1),
            Err(Error::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_precedes_uses_sort_key_then_id() {
        let anchor = item_at(100);
        let position = CursorPosition::of(&anchor, 0);

        assert!(position.precedes(&item_at(99)));
        assert!(!position.precedes(&item_at(101)));
        assert!(!position.precedes(&anchor));
    }
}

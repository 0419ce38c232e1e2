//! Type registry and stored document codec.
//!
//! Loading a file means turning bytes back into some concrete item type.
//! The registry records, per item kind, how to do that. It is an explicit
//! value owned by the [`PersistenceProvider`](crate::provider::PersistenceProvider)
//! rather than process-wide state: register every kind that may ever be
//! stored before the first load, and do not register more afterwards.
//!
//! # Document format
//!
//! Each stored file holds one pretty-printed JSON document:
//!
//! ```text
//! {
//!   "kind": "note",
//!   "id": 7,
//!   "name": "Pin Map",
//!   "saved_at": "2026-10-17T09:30:00Z",
//!   "checksum": "<sha256 of the compact payload, hex>",
//!   "payload": { ... }
//! }
//! ```
//!
//! Decoding rejects unknown kinds and payloads whose checksum no longer
//! matches, so a truncated or hand-edited file loads as "not found" instead
//! of as a silently wrong item.

use crate::error::{Error, Result};
use crate::item::{Item, ItemId, ItemType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Decoder = Arc<dyn Fn(serde_json::Value) -> serde_json::Result<Arc<dyn Item>> + Send + Sync>;

/// On-disk representation of one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDocument {
    /// Kind tag used to select the decoder.
    pub kind: String,
    /// Item id at the time of writing.
    pub id: ItemId,
    /// Item name at the time of writing (unsanitized).
    pub name: String,
    /// When the document was encoded.
    pub saved_at: DateTime<Utc>,
    /// Hex SHA-256 of the compact JSON encoding of `payload`.
    pub checksum: String,
    /// The item's own serialized state.
    pub payload: serde_json::Value,
}

impl ItemDocument {
    fn checksum_of(payload: &serde_json::Value) -> Result<String> {
        let canonical = serde_json::to_vec(payload)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }
}

/// Decoders for every item kind that may be loaded.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<String, Decoder>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the concrete type of `example` under its kind.
    ///
    /// Registering a kind again replaces the earlier decoder.
    pub fn register<T: ItemType>(&mut self, example: &T) {
        self.register_type::<T>(example.kind());
    }

    /// Registers `T` under an explicit kind, without an example instance.
    pub fn register_type<T: ItemType>(&mut self, kind: impl Into<String>) {
        let kind = kind.into();
        let decoder: Decoder = Arc::new(
            |payload: serde_json::Value| -> serde_json::Result<Arc<dyn Item>> {
                Ok(Arc::new(T::from_payload(payload)?))
            },
        );
        if self.decoders.insert(kind.clone(), decoder).is_some() {
            debug!(kind = %kind, "Replaced previously registered item kind");
        } else {
            debug!(kind = %kind, "Registered item kind");
        }
    }

    /// Returns whether `kind` has a decoder.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Encodes `item` as a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKind`] if the item's kind is not registered
    /// (it could never be loaded again), or [`Error::Serialization`] if the
    /// item's payload cannot be produced.
    pub fn encode(&self, item: &dyn Item) -> Result<Vec<u8>> {
        if !self.contains(item.kind()) {
            return Err(Error::UnknownKind(item.kind().to_string()));
        }
        let payload = item.to_payload()?;
        let document = ItemDocument {
            kind: item.kind().to_string(),
            id: item.id(),
            name: item.name().to_string(),
            saved_at: Utc::now(),
            checksum: ItemDocument::checksum_of(&payload)?,
            payload,
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// Decodes a stored document back into an item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] for malformed documents or payloads,
    /// [`Error::ChecksumMismatch`] for tampered payloads,
    /// [`Error::UnknownKind`] for unregistered kinds, and
    /// [`Error::KindMismatch`] if the decoder yields an item of another kind.
    pub fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn Item>> {
        let document: ItemDocument = serde_json::from_slice(bytes)?;
        if ItemDocument::checksum_of(&document.payload)? != document.checksum {
            return Err(Error::ChecksumMismatch { id: document.id });
        }
        let decoder = self
            .decoders
            .get(&document.kind)
            .ok_or_else(|| Error::UnknownKind(document.kind.clone()))?;
        let item = decoder(document.payload)?;
        if item.kind() != document.kind {
            return Err(Error::KindMismatch {
                expected: document.kind,
                actual: item.kind().to_string(),
            });
        }
        Ok(item)
    }
}

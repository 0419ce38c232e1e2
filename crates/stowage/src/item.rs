//! The item model.
//!
//! An item is any identifiable, named record that can turn itself into a
//! JSON payload. Items reach the persistence layer as `Arc<dyn Item>`; the
//! layer never mutates them and only constructs new ones when loading, via
//! the per-type [`ItemType::from_payload`] recorded in the
//! [`TypeRegistry`](crate::registry::TypeRegistry).
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::any::Any;
//! use stowage::item::{Item, ItemId, ItemType};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Sketch {
//!     id: ItemId,
//!     name: String,
//!     strokes: Vec<u32>,
//! }
//!
//! impl Item for Sketch {
//!     fn id(&self) -> ItemId { self.id }
//!     fn name(&self) -> &str { &self.name }
//!     fn kind(&self) -> &str { "sketch" }
//!     fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
//!         serde_json::to_value(self)
//!     }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! impl ItemType for Sketch {
//!     fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self> {
//!         serde_json::from_value(payload)
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;

/// Identifier of an item, unique among live items.
pub type ItemId = u64;

/// A persistable domain record.
///
/// `id` must never change for the lifetime of the item. `name` may change,
/// but the file an item is stored under is fixed when a persist task for it
/// is processed.
pub trait Item: fmt::Debug + Send + Sync + 'static {
    /// The item's unique id.
    fn id(&self) -> ItemId;

    /// Human-readable name; whitespace is allowed.
    fn name(&self) -> &str;

    /// Stable tag naming the concrete type, used to pick a decoder on load.
    fn kind(&self) -> &str;

    /// Serializes the item's state.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be represented as JSON.
    fn to_payload(&self) -> serde_json::Result<serde_json::Value>;

    /// Upcast for downcasting loaded items to their concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// A concrete item type that can be rebuilt from its payload.
pub trait ItemType: Item + Sized {
    /// Rebuilds an item from a payload produced by [`Item::to_payload`].
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not describe a valid item.
    fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self>;
}

impl dyn Item {
    /// Returns the item as `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Item>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Probe {
        id: ItemId,
        name: String,
    }

    impl Item for Probe {
        fn id(&self) -> ItemId {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> &str {
            "probe"
        }
        fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Other;

    impl Item for Other {
        fn id(&self) -> ItemId {
            0
        }
        fn name(&self) -> &str {
            "other"
        }
        fn kind(&self) -> &str {
            "other"
        }
        fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn downcast_to_concrete_type() {
        let item: Box<dyn Item> = Box::new(Probe {
            id: 3,
            name: "p".to_string(),
        });

        assert_eq!(item.downcast_ref::<Probe>().map(|p| p.id), Some(3));
        assert!(item.downcast_ref::<Other>().is_none());
    }
}

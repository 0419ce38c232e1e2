//! A minimal built-in item kind: a named text note.
//!
//! Used by the `stowage` command-line tool and handy for smoke-testing a
//! store.

use crate::item::{Item, ItemId, ItemType};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// A named piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique id.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Free-form text.
    #[serde(default)]
    pub body: String,
}

impl Note {
    /// Kind tag of stored notes.
    pub const KIND: &'static str = "note";

    /// Creates a note.
    pub fn new(id: ItemId, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            body: body.into(),
        }
    }

    /// Returns a copy with a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

impl Item for Note {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        Self::KIND
    }

    fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ItemType for Note {
    fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(payload)
    }
}

//! Wire model of the watched custom resources.
//!
//! Objects are decoded into a generic [`Envelope`] carrying the object name,
//! any further metadata as an open map, and the typed spec payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod stream;
pub use stream::{App, Property, StreamSpec};
pub mod stream_app;
pub use stream_app::StreamAppSpec;

/// Identity of a decoded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub name: String,
    /// Remaining metadata fields (namespace, uid, labels, ...), passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A custom resource object: identity plus spec payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<S> {
    pub metadata: ObjectMetadata,
    pub spec: S,
}

impl<S> Envelope<S> {
    pub fn new(name: impl Into<String>, spec: S) -> Self {
        Self {
            metadata: ObjectMetadata {
                name: name.into(),
                extra: BTreeMap::new(),
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Status document the apiserver sends in place of an object on `ERROR` events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WatchStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

/// One line of a watch feed: `{"type": ..., "object": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<S> {
    Added(Envelope<S>),
    Deleted(Envelope<S>),
    Modified(Envelope<S>),
    /// Progress marker; carries no object we care about.
    Bookmark(Value),
    Error(WatchStatus),
}

impl<S> WatchEvent<S> {
    /// Lowercase event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Deleted(_) => "deleted",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Bookmark(_) => "bookmark",
            WatchEvent::Error(_) => "error",
        }
    }
}

//! Element handles shared between collections.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw slot value meaning "no source ID attached". Lies outside the `i32` range.
const UNSET: i64 = i64::MIN;

/// A shared reference to an element.
///
/// Collections never own element data exclusively: a merged collection holds
/// clones of the same handles as the collections it was built from.
pub type ElementHandle = Arc<Element>;

/// An opaque element stored in a collection.
///
/// The payload is never inspected by the merger. The only mutable part is the
/// source-ID slot, which can be written through a shared handle and is then
/// visible from every collection referencing the element.
#[derive(Debug)]
pub struct Element {
    data: serde_json::Value,
    source_id: AtomicI64,
}

impl Element {
    /// Creates an element with no source ID attached.
    pub const fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            source_id: AtomicI64::new(UNSET),
        }
    }

    /// Creates a shared handle to a new element.
    pub fn handle(data: serde_json::Value) -> ElementHandle {
        Arc::new(Self::new(data))
    }

    /// Returns the element's payload.
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Returns the ID of the collection this element was merged from, if tagged.
    pub fn source_id(&self) -> Option<i32> {
        i32::try_from(self.source_id.load(Ordering::Relaxed)).ok()
    }

    /// Tags the element with a source collection ID, replacing any earlier tag.
    pub fn set_source_id(&self, id: i32) {
        self.source_id.store(i64::from(id), Ordering::Relaxed);
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.source_id() == other.source_id()
    }
}

/// Wire form of an element.
#[derive(Serialize, Deserialize)]
struct ElementRecord<D> {
    data: D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_id: Option<i32>,
}

impl Serialize for Element {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ElementRecord {
            data: &self.data,
            source_id: self.source_id(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = ElementRecord::<serde_json::Value>::deserialize(deserializer)?;
        let element = Self::new(record.data);
        if let Some(id) = record.source_id {
            element.set_source_id(id);
        }
        Ok(element)
    }
}

//! Events: the processing unit that owns a set of named collections.
//!
//! # Wire Format
//!
//! An event is written as `{"run_number", "event_number", "collections"}`.
//! Collections that own their elements write them inline. Subset collections
//! write each element as `{"collection": <owner>, "index": <i>}`, pointing at
//! the first owning collection that holds the same handle. Reading resolves
//! those references back to the owner's handles, so a subset still shares
//! identity and source tags with its inputs after a write/read cycle.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::collection::Collection;
use crate::element::{Element, ElementHandle};
use crate::parameters::Parameters;

/// Errors raised when writing collections into an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A collection with this name is already registered in the event.
    #[error("collection already exists in event: {0}")]
    DuplicateCollection(String),

    /// Collections cannot be registered under an empty name.
    #[error("collection name cannot be empty")]
    EmptyName,
}

/// Looks up collections by name within the current event.
///
/// This trait allows the merger to work with different event representations
/// (e.g., [`Event`], or test fixtures).
pub trait CollectionProvider {
    /// Returns the named collection, or `None` if it does not exist.
    ///
    /// An empty name never resolves.
    fn collection(&self, name: &str) -> Option<&Collection>;
}

/// Accepts newly created collections for the remainder of the event.
pub trait CollectionSink {
    /// Stores `collection` under `name`. The sink takes ownership.
    fn add_collection(&mut self, name: &str, collection: Collection) -> Result<(), EventError>;
}

/// A single processing unit with its named collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Run this event belongs to.
    pub run_number: i32,

    /// Event number within the run.
    pub event_number: i32,

    /// Collections keyed by name, in registration order.
    pub collections: IndexMap<String, Collection>,
}

impl Event {
    /// Creates an empty event.
    pub fn new(run_number: i32, event_number: i32) -> Self {
        Self {
            run_number,
            event_number,
            collections: IndexMap::new(),
        }
    }

    /// Adds a collection, returning the event for chaining.
    ///
    /// Replaces any collection already stored under `name`. Intended for building
    /// fixtures; processors register their output through [`CollectionSink`].
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, collection: Collection) -> Self {
        self.collections.insert(name.into(), collection);
        self
    }

    /// Maps each element to the first owning (non-subset) collection holding it.
    fn element_owners(&self) -> HashMap<*const Element, (&str, usize)> {
        let mut owners = HashMap::new();
        for (name, col) in self.collections.iter().filter(|(_, col)| !col.is_subset()) {
            for (index, element) in col.elements().iter().enumerate() {
                owners
                    .entry(Arc::as_ptr(element))
                    .or_insert((name.as_str(), index));
            }
        }
        owners
    }
}

impl CollectionProvider for Event {
    fn collection(&self, name: &str) -> Option<&Collection> {
        if name.is_empty() {
            return None;
        }
        self.collections.get(name)
    }
}

impl CollectionSink for Event {
    fn add_collection(&mut self, name: &str, collection: Collection) -> Result<(), EventError> {
        if name.is_empty() {
            return Err(EventError::EmptyName);
        }
        if self.collections.contains_key(name) {
            return Err(EventError::DuplicateCollection(name.to_string()));
        }
        self.collections.insert(name.to_string(), collection);
        Ok(())
    }
}

/// Wire form of an element slot in a collection.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ElementEntry<N, H> {
    Ref { collection: N, index: usize },
    Inline(H),
}

/// Wire form of a collection inside an event.
#[derive(Serialize, Deserialize)]
struct CollectionRecord<N, E, P> {
    type_name: N,
    #[serde(default)]
    flags: i32,
    #[serde(default)]
    transient: bool,
    #[serde(default)]
    subset: bool,
    #[serde(default = "Vec::new")]
    elements: Vec<E>,
    #[serde(default)]
    parameters: P,
}

#[derive(Serialize, Deserialize)]
struct EventRecord<C> {
    #[serde(default)]
    run_number: i32,
    #[serde(default)]
    event_number: i32,
    #[serde(default)]
    collections: C,
}

type OwnedEntry = ElementEntry<String, ElementHandle>;
type OwnedRecord = CollectionRecord<String, OwnedEntry, Parameters>;

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let owners = self.element_owners();
        let collections: IndexMap<&str, _> = self
            .collections
            .iter()
            .map(|(name, col)| {
                let elements: Vec<_> = col
                    .elements()
                    .iter()
                    .map(|element| match owners.get(&Arc::as_ptr(element)) {
                        Some(&(owner, index)) if col.is_subset() => ElementEntry::Ref {
                            collection: owner,
                            index,
                        },
                        _ => ElementEntry::Inline(element),
                    })
                    .collect();
                let record = CollectionRecord {
                    type_name: col.type_name(),
                    flags: col.flags(),
                    transient: col.is_transient(),
                    subset: col.is_subset(),
                    elements,
                    parameters: col.parameters(),
                };
                (name.as_str(), record)
            })
            .collect();

        EventRecord {
            run_number: self.run_number,
            event_number: self.event_number,
            collections,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = EventRecord::<IndexMap<String, OwnedRecord>>::deserialize(deserializer)?;

        let mut owners: HashMap<String, Vec<ElementHandle>> = HashMap::new();
        for (name, col) in record.collections.iter().filter(|(_, col)| !col.subset) {
            let elements = col
                .elements
                .iter()
                .map(|entry| match entry {
                    ElementEntry::Inline(element) => Ok(Arc::clone(element)),
                    ElementEntry::Ref { collection, .. } => Err(D::Error::custom(format!(
                        "collection `{name}` is not a subset but references `{collection}`"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            owners.insert(name.clone(), elements);
        }

        let mut collections = IndexMap::with_capacity(record.collections.len());
        for (name, col) in record.collections {
            let elements = if col.subset {
                col.elements
                    .into_iter()
                    .map(|entry| resolve(&owners, entry))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(D::Error::custom)?
            } else {
                owners.get(&name).cloned().unwrap_or_default()
            };

            let mut collection = Collection::new(col.type_name).with_flags(col.flags);
            collection.set_transient(col.transient);
            collection.set_subset(col.subset);
            collection.extend(elements);
            *collection.parameters_mut() = col.parameters;
            collections.insert(name, collection);
        }

        Ok(Self {
            run_number: record.run_number,
            event_number: record.event_number,
            collections,
        })
    }
}

fn resolve(
    owners: &HashMap<String, Vec<ElementHandle>>,
    entry: OwnedEntry,
) -> Result<ElementHandle, String> {
    match entry {
        ElementEntry::Inline(element) => Ok(element),
        ElementEntry::Ref { collection, index } => owners
            .get(&collection)
            .ok_or_else(|| format!("element reference to unknown collection `{collection}`"))?
            .get(index)
            .cloned()
            .ok_or_else(|| format!("element reference `{collection}`[{index}] is out of range")),
    }
}

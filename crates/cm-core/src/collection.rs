//! Collections of element handles.

use serde::{Deserialize, Serialize};

use crate::element::ElementHandle;
use crate::parameters::Parameters;

/// An ordered sequence of element handles with a type tag and metadata.
///
/// All elements in a collection are of the kind named by `type_name`. The
/// `flags` bitmask is opaque and only ever copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    type_name: String,

    #[serde(default)]
    flags: i32,

    /// Whether the collection is dropped rather than written out with the event.
    #[serde(default)]
    transient: bool,

    /// Whether the collection only references elements owned by other collections.
    #[serde(default)]
    subset: bool,

    #[serde(default)]
    elements: Vec<ElementHandle>,

    #[serde(default)]
    parameters: Parameters,
}

impl Collection {
    /// Creates an empty collection of the given element type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            flags: 0,
            transient: false,
            subset: false,
            elements: Vec::new(),
            parameters: Parameters::default(),
        }
    }

    /// Sets the flag bitmask, returning the collection for chaining.
    #[must_use]
    pub fn with_flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub const fn flags(&self) -> i32 {
        self.flags
    }

    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    pub const fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    pub const fn is_subset(&self) -> bool {
        self.subset
    }

    pub const fn set_subset(&mut self, subset: bool) {
        self.subset = subset;
    }

    /// Appends a handle to the end of the collection.
    pub fn push(&mut self, element: ElementHandle) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[ElementHandle] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub const fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }
}

impl Extend<ElementHandle> for Collection {
    fn extend<I: IntoIterator<Item = ElementHandle>>(&mut self, iter: I) {
        self.elements.extend(iter);
    }
}

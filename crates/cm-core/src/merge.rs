//! Collection merge algorithm.
//!
//! Merges an ordered list of named, possibly missing collections into a single
//! subset collection that references the input elements.
//!
//! # Algorithm Summary
//!
//! 1. Look up every configured name; absent collections are skipped
//! 2. Seed the output's type and flags from the first present collection
//! 3. Append elements of each present collection in configured order, tagging
//!    them with the paired source ID when IDs are configured
//! 4. Copy every metadata key of each present collection as `<name>_<key>`
//! 5. Record which inputs contributed and how much under reserved keys

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::Collection;
use crate::event::CollectionProvider;
use crate::parameters::{ParameterValue, Parameters};

/// Reserved key: all configured input names (string).
pub const MERGED_NAMES_KEY: &str = "MergedCollectionNames";
/// Reserved key: all configured input IDs, only set when IDs are configured (int).
pub const MERGED_IDS_KEY: &str = "MergedCollectionIDs";
/// Reserved key: names of the inputs that were present (string).
pub const NAMES_PRESENT_KEY: &str = "MergedCollection_NamesPresent";
/// Reserved key: element count per present input (int).
pub const N_ELEMENTS_KEY: &str = "MergedCollection_NElements";
/// Reserved key: integer metadata keys copied per present input (int).
pub const N_INT_PARAMETERS_KEY: &str = "MergedCollection_NIntParameters";
/// Reserved key: float metadata keys copied per present input (int).
pub const N_FLOAT_PARAMETERS_KEY: &str = "MergedCollection_NFloatParameters";
/// Reserved key: string metadata keys copied per present input (int).
pub const N_STRING_PARAMETERS_KEY: &str = "MergedCollection_NStringParameters";

/// Default name of the merged collection.
pub const DEFAULT_OUTPUT_COLLECTION: &str = "MergedCollection";

/// Configuration errors. These are setup mistakes, not per-event data issues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// IDs were configured but not one per input collection.
    #[error(
        "incompatible parameter vector sizes: InputCollections: {names} <-> InputCollectionIDs: {ids}"
    )]
    IdCountMismatch { names: usize, ids: usize },

    /// The output collection name is empty.
    #[error("OutputCollection cannot be empty")]
    EmptyOutputName,
}

/// Which collections to merge and where to put the result.
///
/// Read-only once loaded; the same configuration is reused for every event and
/// can be shared between threads processing events concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Names of the input collections. Order is significant; duplicates are allowed.
    pub input_collections: Vec<String>,

    /// Optional source IDs, one per input collection. Empty means no tagging.
    pub input_collection_ids: Vec<i32>,

    /// Name the merged collection is registered under.
    pub output_collection: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            input_collections: Vec::new(),
            input_collection_ids: Vec::new(),
            output_collection: DEFAULT_OUTPUT_COLLECTION.to_string(),
        }
    }
}

impl MergeConfig {
    /// Creates a configuration merging `inputs` into the default output name.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input_collections: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the per-input source IDs.
    #[must_use]
    pub fn with_ids(mut self, ids: impl Into<Vec<i32>>) -> Self {
        self.input_collection_ids = ids.into();
        self
    }

    /// Sets the output collection name.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output_collection = name.into();
        self
    }

    /// Checks that the configuration can be applied to an event.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let names = self.input_collections.len();
        let ids = self.input_collection_ids.len();
        if ids != 0 && ids != names {
            return Err(ConfigurationError::IdCountMismatch { names, ids });
        }
        if self.output_collection.is_empty() {
            return Err(ConfigurationError::EmptyOutputName);
        }
        Ok(())
    }

    /// Source ID paired with the input at configured position `index`.
    fn id_for(&self, index: usize) -> Option<i32> {
        self.input_collection_ids.get(index).copied()
    }
}

/// Per-input bookkeeping, one entry per present collection.
#[derive(Debug, Default)]
struct Contributions {
    names: Vec<String>,
    elements: Vec<i32>,
    int_keys: Vec<i32>,
    float_keys: Vec<i32>,
    string_keys: Vec<i32>,
}

impl Contributions {
    fn write_to(self, output: &mut Collection, config: &MergeConfig) {
        let params = output.parameters_mut();
        set_reserved(params, MERGED_NAMES_KEY, config.input_collections.clone());
        if !config.input_collection_ids.is_empty() {
            set_reserved(params, MERGED_IDS_KEY, config.input_collection_ids.clone());
        }
        set_reserved(params, NAMES_PRESENT_KEY, self.names);
        set_reserved(params, N_ELEMENTS_KEY, self.elements);
        set_reserved(params, N_INT_PARAMETERS_KEY, self.int_keys);
        set_reserved(params, N_FLOAT_PARAMETERS_KEY, self.float_keys);
        set_reserved(params, N_STRING_PARAMETERS_KEY, self.string_keys);
    }
}

/// Writes a bookkeeping key. Bookkeeping wins over a copied key of the same name.
fn set_reserved<T: ParameterValue>(params: &mut Parameters, key: &str, values: Vec<T>) {
    if params.values::<T>(key).is_some() {
        tracing::warn!(
            key,
            kind = %T::KIND,
            "copied metadata key overwritten by merge bookkeeping"
        );
    }
    params.set_values(key, values);
}

/// Counts are stored as integer metadata; saturate instead of wrapping.
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Merge the configured collections of one event into a new subset collection.
///
/// Returns `Ok(None)` when none of the configured collections is present; no
/// output should be registered in that case. The returned collection shares
/// element handles with its inputs and is not yet registered anywhere.
///
/// # Errors
///
/// Fails with [`ConfigurationError`] if the configuration is invalid (see
/// [`MergeConfig::validate`]). Missing inputs are never an error.
pub fn merge<P>(
    provider: &P,
    config: &MergeConfig,
) -> Result<Option<Collection>, ConfigurationError>
where
    P: CollectionProvider + ?Sized,
{
    config.validate()?;

    let present: Vec<(usize, &str, &Collection)> = config
        .input_collections
        .iter()
        .enumerate()
        .filter_map(|(index, name)| match provider.collection(name) {
            Some(col) => Some((index, name.as_str(), col)),
            None => {
                tracing::trace!(collection = %name, "input collection missing");
                None
            }
        })
        .collect();

    let Some(&(_, _, first)) = present.first() else {
        tracing::debug!(
            configured = config.input_collections.len(),
            "no input collections present, nothing merged"
        );
        return Ok(None);
    };

    let mut output = Collection::new(first.type_name()).with_flags(first.flags());
    let mut contributions = Contributions::default();

    for &(index, name, col) in &present {
        if let Some(id) = config.id_for(index) {
            for element in col.elements() {
                element.set_source_id(id);
            }
        }
        output.extend(col.elements().iter().cloned());

        let source = col.parameters();
        let params = output.parameters_mut();
        let ints = params.copy_prefixed::<i32>(source, name);
        let floats = params.copy_prefixed::<f32>(source, name);
        let strings = params.copy_prefixed::<String>(source, name);

        contributions.names.push(name.to_string());
        contributions.elements.push(count(col.len()));
        contributions.int_keys.push(count(ints));
        contributions.float_keys.push(count(floats));
        contributions.string_keys.push(count(strings));
    }

    contributions.write_to(&mut output, config);
    output.set_transient(false);
    output.set_subset(true);

    tracing::debug!(
        present = present.len(),
        configured = config.input_collections.len(),
        elements = output.len(),
        type_name = output.type_name(),
        "merged collections"
    );

    Ok(Some(output))
}

//! Typed metadata attached to a collection.
//!
//! A collection carries three independent maps from string key to a list of
//! values: one each for integers, floats and strings. The kind is part of the
//! observable interface (a key set as integers is not visible as floats), so
//! the maps are kept apart rather than folded into one dynamically typed map.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The kind of values stored under a parameter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Int,
    Float,
    String,
}

impl ParameterKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value type that can be stored in [`Parameters`].
///
/// Implemented for `i32`, `f32` and `String`; each maps to its own key space.
pub trait ParameterValue: Clone + 'static {
    /// The kind this value type is stored under.
    const KIND: ParameterKind;

    #[doc(hidden)]
    fn map(params: &Parameters) -> &IndexMap<String, Vec<Self>>;

    #[doc(hidden)]
    fn map_mut(params: &mut Parameters) -> &mut IndexMap<String, Vec<Self>>;
}

impl ParameterValue for i32 {
    const KIND: ParameterKind = ParameterKind::Int;

    fn map(params: &Parameters) -> &IndexMap<String, Vec<Self>> {
        &params.ints
    }

    fn map_mut(params: &mut Parameters) -> &mut IndexMap<String, Vec<Self>> {
        &mut params.ints
    }
}

impl ParameterValue for f32 {
    const KIND: ParameterKind = ParameterKind::Float;

    fn map(params: &Parameters) -> &IndexMap<String, Vec<Self>> {
        &params.floats
    }

    fn map_mut(params: &mut Parameters) -> &mut IndexMap<String, Vec<Self>> {
        &mut params.floats
    }
}

impl ParameterValue for String {
    const KIND: ParameterKind = ParameterKind::String;

    fn map(params: &Parameters) -> &IndexMap<String, Vec<Self>> {
        &params.strings
    }

    fn map_mut(params: &mut Parameters) -> &mut IndexMap<String, Vec<Self>> {
        &mut params.strings
    }
}

/// Metadata bag of a collection.
///
/// Keys are unique within each kind. Iteration follows insertion order;
/// overwriting a key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(rename = "int", default, skip_serializing_if = "IndexMap::is_empty")]
    ints: IndexMap<String, Vec<i32>>,

    #[serde(rename = "float", default, skip_serializing_if = "IndexMap::is_empty")]
    floats: IndexMap<String, Vec<f32>>,

    #[serde(rename = "string", default, skip_serializing_if = "IndexMap::is_empty")]
    strings: IndexMap<String, Vec<String>>,
}

impl Parameters {
    /// Creates an empty metadata bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `values` under `key`, replacing any previous list of the same kind.
    pub fn set_values<T: ParameterValue>(&mut self, key: impl Into<String>, values: Vec<T>) {
        T::map_mut(self).insert(key.into(), values);
    }

    /// Returns the values stored under `key` for kind `T`.
    pub fn values<T: ParameterValue>(&self, key: &str) -> Option<&[T]> {
        T::map(self).get(key).map(Vec::as_slice)
    }

    /// Returns the keys of kind `T` in insertion order.
    pub fn keys<T: ParameterValue>(&self) -> impl Iterator<Item = &str> {
        T::map(self).keys().map(String::as_str)
    }

    /// Iterates over key/value-list pairs of kind `T` in insertion order.
    pub fn iter<T: ParameterValue>(&self) -> impl Iterator<Item = (&str, &[T])> {
        T::map(self)
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of keys of kind `T`.
    pub fn len<T: ParameterValue>(&self) -> usize {
        T::map(self).len()
    }

    /// Returns true if no key of any kind is set.
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.floats.is_empty() && self.strings.is_empty()
    }

    /// Copies every key of kind `T` from `source` into `self` as `<prefix>_<key>`.
    ///
    /// Returns the number of keys copied.
    pub fn copy_prefixed<T: ParameterValue>(&mut self, source: &Self, prefix: &str) -> usize {
        let target = T::map_mut(self);
        let mut copied = 0;
        for (key, values) in T::map(source) {
            target.insert(format!("{prefix}_{key}"), values.clone());
            copied += 1;
        }
        tracing::trace!(kind = %T::KIND, prefix, copied, "copied metadata keys");
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_have_separate_key_spaces() {
        let mut params = Parameters::new();
        params.set_values("energy", vec![1_i32, 2]);
        params.set_values("energy", vec![0.5_f32]);

        assert_eq!(params.values::<i32>("energy"), Some(&[1, 2][..]));
        assert_eq!(params.values::<f32>("energy"), Some(&[0.5][..]));
        assert_eq!(params.values::<String>("energy"), None);
        assert_eq!(params.len::<i32>(), 1);
        assert_eq!(params.len::<f32>(), 1);
        assert_eq!(params.len::<String>(), 0);
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let mut params = Parameters::new();
        params.set_values("a", vec![1_i32]);
        params.set_values("b", vec![2_i32]);
        params.set_values("a", vec![3_i32]);

        let keys: Vec<_> = params.keys::<i32>().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(params.values::<i32>("a"), Some(&[3][..]));
    }

    #[test]
    fn test_iter_yields_pairs_in_insertion_order() {
        let mut params = Parameters::new();
        params.set_values("z", vec![1.0_f32]);
        params.set_values("a", vec![2.0_f32, 3.0]);

        let pairs: Vec<_> = params.iter::<f32>().collect();
        assert_eq!(pairs, [("z", &[1.0][..]), ("a", &[2.0, 3.0][..])]);
    }

    #[test]
    fn test_copy_prefixed_renames_every_key() {
        let mut source = Parameters::new();
        source.set_values("foo", vec!["x".to_string(), "y".to_string()]);
        source.set_values("bar", vec![String::new()]);

        let mut target = Parameters::new();
        let copied = target.copy_prefixed::<String>(&source, "Tracks");

        assert_eq!(copied, 2);
        let keys: Vec<_> = target.keys::<String>().collect();
        assert_eq!(keys, ["Tracks_foo", "Tracks_bar"]);
        assert_eq!(
            target.values::<String>("Tracks_foo"),
            Some(&["x".to_string(), "y".to_string()][..])
        );
        assert!(target.values::<String>("foo").is_none());
    }

    #[test]
    fn test_copy_prefixed_only_touches_requested_kind() {
        let mut source = Parameters::new();
        source.set_values("n", vec![7_i32]);
        source.set_values("w", vec![1.5_f32]);

        let mut target = Parameters::new();
        assert_eq!(target.copy_prefixed::<i32>(&source, "A"), 1);
        assert_eq!(target.len::<i32>(), 1);
        assert_eq!(target.len::<f32>(), 0);
    }

    #[test]
    fn test_empty_maps_are_omitted_from_json() {
        let mut params = Parameters::new();
        params.set_values("n", vec![1_i32, 2]);

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"int":{"n":[1,2]}}"#);

        let parsed: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
        assert!(Parameters::new().is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ParameterKind::Int.to_string(), "int");
        assert_eq!(ParameterKind::Float.to_string(), "float");
        assert_eq!(ParameterKind::String.to_string(), "string");
    }
}

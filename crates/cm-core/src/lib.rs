//! Core collection model and merge logic.
//!
//! This crate contains the fundamental types and logic for:
//! - Collections: ordered element handles with a type tag, flags and typed metadata
//! - Events: the processing unit providing and accepting named collections
//! - Merging: combining several collections into one subset collection while
//!   recording where each element and metadata key came from

mod collection;
mod element;
pub mod event;
pub mod merge;
pub mod parameters;
mod processor;
pub mod types;

pub use collection::Collection;
pub use element::{Element, ElementHandle};
pub use event::{CollectionProvider, CollectionSink, Event, EventError};
pub use merge::{ConfigurationError, MergeConfig, merge};
pub use parameters::{ParameterKind, ParameterValue, Parameters};
pub use processor::{MergeProcessor, ProcessError, ProcessingStats};
pub use types::{CollectionName, ValidationError};

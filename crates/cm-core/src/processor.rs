//! Per-event driver around [`merge`].
//!
//! The processor owns the configuration for a whole processing job, registers
//! the merged collection in each event and keeps run/event counters.

use thiserror::Error;

use crate::event::{CollectionSink, Event, EventError};
use crate::merge::{ConfigurationError, MergeConfig, merge};
use crate::types::CollectionName;

/// Errors raised while processing an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("invalid merge configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("failed to register merged collection: {0}")]
    Event(#[from] EventError),
}

/// Counters reported at the end of processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Run headers seen.
    pub runs: usize,
    /// Events processed.
    pub events: usize,
    /// Events that received a merged collection.
    pub merged: usize,
}

/// Merges the configured collections of every event it is given.
#[derive(Debug, Clone)]
pub struct MergeProcessor {
    config: MergeConfig,
    output: CollectionName,
    stats: ProcessingStats,
}

impl MergeProcessor {
    /// Creates a processor, rejecting invalid configurations up front.
    pub fn new(config: MergeConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let output = CollectionName::new(config.output_collection.clone())
            .map_err(|_| ConfigurationError::EmptyOutputName)?;
        Ok(Self {
            config,
            output,
            stats: ProcessingStats::default(),
        })
    }

    pub const fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub const fn stats(&self) -> ProcessingStats {
        self.stats
    }

    /// Logs the effective parameters.
    pub fn init(&self) {
        tracing::info!(
            input_collections = ?self.config.input_collections,
            input_collection_ids = ?self.config.input_collection_ids,
            output_collection = %self.output,
            "merge processor initialized"
        );
    }

    /// Called once at the start of every run.
    pub fn process_run_header(&mut self, run_number: i32) {
        tracing::debug!(run_number, "processing run");
        self.stats.runs += 1;
    }

    /// Merges and registers the output for one event.
    ///
    /// Returns whether a merged collection was registered.
    pub fn process_event(&mut self, event: &mut Event) -> Result<bool, ProcessError> {
        let merged = self.apply(event)?;
        self.record_events(1, usize::from(merged));
        Ok(merged)
    }

    /// Merges and registers the output for one event without touching counters.
    ///
    /// Takes `&self` so that independent events can be processed concurrently
    /// against one shared processor; callers account for the results with
    /// [`record_events`](Self::record_events).
    pub fn apply(&self, event: &mut Event) -> Result<bool, ProcessError> {
        let Some(output) = merge(&*event, &self.config)? else {
            tracing::debug!(
                run_number = event.run_number,
                event_number = event.event_number,
                "no input collections present"
            );
            return Ok(false);
        };

        event.add_collection(self.output.as_str(), output)?;
        tracing::debug!(
            run_number = event.run_number,
            event_number = event.event_number,
            output = %self.output,
            "registered merged collection"
        );
        Ok(true)
    }

    /// Adds externally processed events to the counters.
    pub const fn record_events(&mut self, events: usize, merged: usize) {
        self.stats.events += events;
        self.stats.merged += merged;
    }

    /// Logs the summary and returns the final counters.
    pub fn end(&self) -> ProcessingStats {
        tracing::info!(
            events = self.stats.events,
            runs = self.stats.runs,
            merged = self.stats.merged,
            "processed {} events in {} runs",
            self.stats.events,
            self.stats.runs
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::collection::Collection;
    use crate::element::Element;
    use crate::event::CollectionProvider;
    use crate::merge::NAMES_PRESENT_KEY;

    fn event_with(number: i32, names: &[&str]) -> Event {
        names.iter().fold(Event::new(1, number), |event, name| {
            let mut col = Collection::new("Track");
            col.push(Element::handle(json!(name)));
            event.with_collection(*name, col)
        })
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let config = MergeConfig::new(["A"]).with_ids([1, 2]);
        assert_eq!(
            MergeProcessor::new(config).unwrap_err(),
            ConfigurationError::IdCountMismatch { names: 1, ids: 2 }
        );
        assert_eq!(
            MergeProcessor::new(MergeConfig::new(["A"]).with_output("")).unwrap_err(),
            ConfigurationError::EmptyOutputName
        );
    }

    #[test]
    fn test_process_event_registers_output() {
        let mut processor =
            MergeProcessor::new(MergeConfig::new(["A", "B"]).with_output("AB")).unwrap();
        let mut event = event_with(1, &["A", "B"]);

        assert!(processor.process_event(&mut event).unwrap());

        let merged = event.collection("AB").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.parameters().values::<String>(NAMES_PRESENT_KEY),
            Some(&["A".to_string(), "B".to_string()][..])
        );
    }

    #[test]
    fn test_process_event_without_inputs_registers_nothing() {
        let mut processor = MergeProcessor::new(MergeConfig::new(["A"])).unwrap();
        let mut event = event_with(1, &["X"]);

        assert!(!processor.process_event(&mut event).unwrap());
        assert!(event.collection("MergedCollection").is_none());
        assert_eq!(event.collections.len(), 1);
    }

    #[test]
    fn test_output_name_collision_is_an_error() {
        let mut processor =
            MergeProcessor::new(MergeConfig::new(["A"]).with_output("A")).unwrap();
        let mut event = event_with(1, &["A"]);

        let err = processor.process_event(&mut event).unwrap_err();
        assert_eq!(
            err,
            ProcessError::Event(EventError::DuplicateCollection("A".to_string()))
        );
        assert_eq!(processor.stats().events, 0);
    }

    #[test]
    fn test_counters_track_runs_and_events() {
        let mut processor = MergeProcessor::new(MergeConfig::new(["A"])).unwrap();
        processor.init();

        processor.process_run_header(1);
        processor.process_event(&mut event_with(1, &["A"])).unwrap();
        processor.process_event(&mut event_with(2, &[])).unwrap();
        processor.process_run_header(2);
        processor.process_event(&mut event_with(1, &["A"])).unwrap();

        assert_eq!(
            processor.end(),
            ProcessingStats {
                runs: 2,
                events: 3,
                merged: 2,
            }
        );
    }

    #[test]
    fn test_apply_leaves_counters_alone() {
        let mut processor = MergeProcessor::new(MergeConfig::new(["A"])).unwrap();
        let mut event = event_with(1, &["A"]);

        assert!(processor.apply(&mut event).unwrap());
        assert_eq!(processor.stats(), ProcessingStats::default());

        processor.record_events(1, 1);
        assert_eq!(processor.stats().merged, 1);
    }
}

//! Merge command: run the collection merger over a JSONL event stream.
//!
//! Each input line is one event. Events are streamed: read, merged and written
//! one at a time, so every event before a failure is already in the output. A
//! run header is counted whenever the run number changes. In parallel mode the
//! stream is cut into batches that are merged on the rayon pool and written
//! back in input order.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use rayon::prelude::*;

use cm_core::{Event, MergeProcessor, ProcessingStats};

use crate::Config;
use crate::cli::MergeArgs;

/// Events handed to the thread pool at once in parallel mode.
const PARALLEL_BATCH_SIZE: usize = 256;

/// Runs the merge command.
pub fn run(args: &MergeArgs, config: &Config) -> Result<ProcessingStats> {
    let mut processor =
        MergeProcessor::new(config.merge.clone()).context("invalid merge configuration")?;
    processor.init();

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(sink);

    let result = process_stream(reader, &mut writer, &mut processor, config.parallel);
    writer.flush().context("failed to write events")?;
    result?;

    Ok(processor.end())
}

/// Reads events from `reader`, merges them and writes them to `writer`.
///
/// Stops at the first unreadable line or failing event; everything before it
/// has been written.
pub fn process_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    processor: &mut MergeProcessor,
    parallel: bool,
) -> Result<()> {
    let mut events = EventReader::new(reader);
    let mut runs = RunTracker::default();

    if !parallel {
        for event in events {
            let mut event = event?;
            runs.observe(&event, processor);
            processor
                .process_event(&mut event)
                .with_context(|| event_context(&event))?;
            write_event(writer, &event)?;
        }
        return Ok(());
    }

    loop {
        let mut batch = Vec::with_capacity(PARALLEL_BATCH_SIZE);
        let mut read_error = None;
        for event in events.by_ref().take(PARALLEL_BATCH_SIZE) {
            match event {
                Ok(event) => batch.push(event),
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            }
        }
        let exhausted = batch.len() < PARALLEL_BATCH_SIZE;

        merge_batch(&mut batch, writer, processor, &mut runs)?;

        if let Some(err) = read_error {
            return Err(err);
        }
        if exhausted {
            return Ok(());
        }
    }
}

/// Merges one batch concurrently, then records and writes it in order.
fn merge_batch<W: Write>(
    batch: &mut [Event],
    writer: &mut W,
    processor: &mut MergeProcessor,
    runs: &mut RunTracker,
) -> Result<()> {
    for event in batch.iter() {
        runs.observe(event, processor);
    }

    let shared = &*processor;
    let results: Vec<Result<bool>> = batch
        .par_iter_mut()
        .map(|event| shared.apply(event).with_context(|| event_context(event)))
        .collect();

    for (event, merged) in batch.iter().zip(results) {
        let merged = merged?;
        processor.record_events(1, usize::from(merged));
        write_event(writer, event)?;
    }
    Ok(())
}

fn event_context(event: &Event) -> String {
    format!(
        "failed to process event {} in run {}",
        event.event_number, event.run_number
    )
}

/// Announces a run header to the processor whenever the run number changes.
#[derive(Debug, Default)]
struct RunTracker {
    current: Option<i32>,
}

impl RunTracker {
    fn observe(&mut self, event: &Event, processor: &mut MergeProcessor) {
        if self.current != Some(event.run_number) {
            self.current = Some(event.run_number);
            processor.process_run_header(event.run_number);
        }
    }
}

/// Parses one event per line, skipping blank lines.
pub struct EventReader<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    return Some(
                        Err(err).with_context(|| format!("failed to read line {}", self.line)),
                    );
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(trimmed)
                    .with_context(|| format!("invalid event on line {}", self.line)),
            );
        }
    }
}

/// Writes one event as a JSONL line.
pub fn write_event<W: Write>(writer: &mut W, event: &Event) -> Result<()> {
    serde_json::to_writer(&mut *writer, event).context("failed to serialize event")?;
    writeln!(writer).context("failed to write event")?;
    Ok(())
}

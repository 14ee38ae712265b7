use crate::output::frame::{FrameError, FrameWriter};
use crate::sequencer::merge::{merge_batch, MergedBatch};
use crate::source::discovery::{enumerate_sources, DiscoveryError, SourceId};
use crate::source::reader::IncrementalReader;
use crate::storage::layout::BucketLayout;
use crate::storage::record::RecordReader;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("source discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("record from source {source_id} at {timestamp} could not be emitted: {error}")]
    Emit {
        source_id: SourceId,
        timestamp: DateTime<Utc>,
        #[source]
        error: FrameError,
    },
}

/// Closed replay range in epoch seconds. Records stamped after `stop` are
/// never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRange {
    pub start: i64,
    pub stop: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub passes: u64,
    pub frames: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowState {
    /// Harvest every source's bucket file for this bucket start.
    Scanning(i64),
    /// Write the merged harvest of this bucket.
    Emitting(i64, MergedBatch),
    /// Choose the next bucket or finish.
    Deciding(i64),
    Done,
}

/// Start of the bucket after the one containing `bucket_start`.
pub fn next_bucket(bucket_start: i64, span: i64) -> i64 {
    (bucket_start - bucket_start.rem_euclid(span)).saturating_add(span)
}

/// Walks the replay range one bucket at a time: discover sources, drain
/// their current bucket files, merge, and emit, until the next bucket would
/// start at or after the stop time.
pub struct WindowAdvancer<'a, L, F> {
    dir: &'a Path,
    range: ReplayRange,
    reader: IncrementalReader<L, F>,
    passes: u64,
}

impl<'a, L: BucketLayout, F: RecordReader> WindowAdvancer<'a, L, F> {
    pub fn new(dir: &'a Path, reader: IncrementalReader<L, F>, range: ReplayRange) -> Self {
        Self {
            dir,
            range,
            reader,
            passes: 0,
        }
    }

    pub fn reader(&self) -> &IncrementalReader<L, F> {
        &self.reader
    }

    pub fn initial_state(&self) -> WindowState {
        WindowState::Scanning(self.range.start)
    }

    /// Replay the whole range into `out`.
    pub fn run<W: Write>(&mut self, out: &mut FrameWriter<W>) -> Result<ReplaySummary, ReplayError> {
        let frames_before = out.frames();
        let bytes_before = out.bytes();
        let passes_before = self.passes;

        let mut state = self.initial_state();
        while state != WindowState::Done {
            state = self.step(state, out)?;
        }

        Ok(ReplaySummary {
            passes: self.passes - passes_before,
            frames: out.frames() - frames_before,
            bytes: out.bytes() - bytes_before,
        })
    }

    /// Advance the state machine by one transition.
    pub fn step<W: Write>(
        &mut self,
        state: WindowState,
        out: &mut FrameWriter<W>,
    ) -> Result<WindowState, ReplayError> {
        let next = match state {
            WindowState::Scanning(bucket_start) => {
                let sources = enumerate_sources(self.dir)?;
                let harvest =
                    self.reader
                        .scan_bucket(self.dir, bucket_start, &sources, bucket_start);
                let batch = merge_batch(harvest);
                self.passes += 1;
                info!(
                    bucket_start,
                    sources = sources.len(),
                    records = batch.len(),
                    "Scanned bucket"
                );
                WindowState::Emitting(bucket_start, batch)
            }
            WindowState::Emitting(bucket_start, batch) => {
                let mut emitted = 0usize;
                for record in batch {
                    if record.timestamp.timestamp() > self.range.stop {
                        debug!(
                            bucket_start,
                            timestamp = %record.timestamp,
                            "Reached stop time, discarding rest of pass"
                        );
                        break;
                    }
                    out.write_frame(&record.payload)
                        .map_err(|error| ReplayError::Emit {
                            source_id: record.source,
                            timestamp: record.timestamp,
                            error,
                        })?;
                    emitted += 1;
                }
                debug!(bucket_start, emitted, "Emitted pass");
                WindowState::Deciding(bucket_start)
            }
            WindowState::Deciding(bucket_start) => {
                let next = next_bucket(bucket_start, self.reader.layout().span());
                if next < self.range.stop {
                    WindowState::Scanning(next)
                } else {
                    WindowState::Done
                }
            }
            WindowState::Done => WindowState::Done,
        };
        Ok(next)
    }
}

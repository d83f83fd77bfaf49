//! Batch build of the three phonetic code indices.
//!
//! Places are streamed from a [`PlaceRepository`], encoded with every
//! algorithm, staged in one writer per algorithm and committed to an
//! [`IndexSink`] every `batch_size` places. Each commit covers all three
//! indices, so they always describe the same set of places.

mod metrics;

pub use metrics::{BatchMetrics, BatchReport};

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{BuildConfig, MalformedPolicy};
use crate::models::{CodeCounts, Place};
use crate::phonetic::{EncodeError, PhoneticEncoderSet};
use crate::store::{
    BuildRecord, CommitPoint, IndexSink, PlaceRepository, SourceError, StoreError, WriterSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Init,
    Streaming,
    Encode,
    Stage,
    Commit,
    FinalFlush,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Init => "init",
            BuildState::Streaming => "streaming",
            BuildState::Encode => "encode",
            BuildState::Stage => "stage",
            BuildState::Commit => "commit",
            BuildState::FinalFlush => "final_flush",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("code indices are not empty and truncation is disabled")]
    IndicesNotEmpty,

    #[error("malformed source record: {0}")]
    MalformedRecord(String),

    #[error("encoder failure: {0}")]
    Encoder(#[from] EncodeError),

    #[error("failed to read places: {0}")]
    Source(#[source] StoreError),

    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),
}

/// A fatal build failure
#[derive(Debug, Error)]
#[error(
    "index build failed in {stage} at offset {offset}{}: {cause}",
    describe_position(.place_id, .last_committed)
)]
pub struct BuildError {
    /// State the run was in when it failed
    pub stage: BuildState,
    pub place_id: Option<i64>,
    /// Places processed before the failure
    pub offset: u64,
    /// Offset of the last batch that was committed, if any
    pub last_committed: Option<u64>,
    #[source]
    pub cause: FailureCause,
}

fn describe_position(place_id: &Option<i64>, last_committed: &Option<u64>) -> String {
    let place = place_id
        .map(|id| format!(" (place {})", id))
        .unwrap_or_default();
    let committed = match last_committed {
        Some(offset) => format!(", last committed offset {}", offset),
        None => ", nothing committed".to_string(),
    };
    format!("{}{}", place, committed)
}

/// Outcome of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub places_processed: u64,
    pub batches_committed: u64,
    pub last_committed_offset: Option<u64>,
    /// Rows committed per algorithm
    pub codes: CodeCounts,
    pub skipped_soundex: u64,
    pub malformed_records: u64,
    pub elapsed_millis: u64,
    pub batches: Vec<BatchReport>,
}

impl BuildSummary {
    pub fn record(&self) -> BuildRecord {
        BuildRecord {
            completed_at: Utc::now(),
            places_processed: self.places_processed,
            batches_committed: self.batches_committed,
            codes: self.codes,
            skipped_soundex: self.skipped_soundex,
            malformed_records: self.malformed_records,
        }
    }

    pub fn log(&self) {
        info!(
            places_processed = self.places_processed,
            batches_committed = self.batches_committed,
            beider_morse_codes = self.codes.beider_morse,
            nysiis_codes = self.codes.nysiis,
            soundex_codes = self.codes.soundex,
            skipped_soundex = self.skipped_soundex,
            malformed_records = self.malformed_records,
            elapsed_millis = self.elapsed_millis,
            "Index build complete"
        );
    }
}

/// One build run over a repository and a sink
pub struct IndexBuildPipeline<'a, R: ?Sized, S: ?Sized> {
    repository: &'a R,
    sink: &'a S,
    config: BuildConfig,
    encoders: PhoneticEncoderSet,
    progress: ProgressBar,
    state: BuildState,
    writers: WriterSet,
    metrics: BatchMetrics,
    places_processed: u64,
    batch_index: u64,
    last_committed: Option<u64>,
    skipped_soundex: u64,
    malformed_records: u64,
    batches: Vec<BatchReport>,
}

impl<'a, R, S> IndexBuildPipeline<'a, R, S>
where
    R: PlaceRepository + ?Sized,
    S: IndexSink + ?Sized,
{
    pub fn new(repository: &'a R, sink: &'a S, config: BuildConfig) -> Self {
        let capacity = config.batch_size;
        Self {
            repository,
            sink,
            config,
            encoders: PhoneticEncoderSet::new(),
            progress: ProgressBar::hidden(),
            state: BuildState::Init,
            writers: WriterSet::new(capacity),
            metrics: BatchMetrics::new(),
            places_processed: 0,
            batch_index: 0,
            last_committed: None,
            skipped_soundex: 0,
            malformed_records: 0,
            batches: Vec::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(mut self) -> Result<BuildSummary, BuildError> {
        let started = Instant::now();

        self.prepare()?;
        self.stream()?;

        self.state = BuildState::FinalFlush;
        if self.metrics.records > 0 {
            self.commit(BuildState::FinalFlush)?;
        }

        let summary = BuildSummary {
            places_processed: self.places_processed,
            batches_committed: self.batch_index,
            last_committed_offset: self.last_committed,
            codes: self.writers.total_written(),
            skipped_soundex: self.skipped_soundex,
            malformed_records: self.malformed_records,
            elapsed_millis: started.elapsed().as_millis() as u64,
            batches: std::mem::take(&mut self.batches),
        };

        self.sink
            .record_build(&summary.record())
            .map_err(|e| self.fail(None, FailureCause::Persistence(e)))?;

        self.state = BuildState::Done;
        self.progress.finish_and_clear();
        Ok(summary)
    }

    fn prepare(&mut self) -> Result<(), BuildError> {
        self.config
            .validate()
            .map_err(|reason| self.fail(None, FailureCause::InvalidConfig(reason)))?;

        if self.config.truncate_before_build {
            self.sink
                .truncate_indices()
                .map_err(|e| self.fail(None, FailureCause::Persistence(e)))?;
        } else {
            let empty = self
                .sink
                .indices_empty()
                .map_err(|e| self.fail(None, FailureCause::Persistence(e)))?;
            if !empty {
                return Err(self.fail(None, FailureCause::IndicesNotEmpty));
            }
        }

        info!(
            batch_size = self.config.batch_size,
            malformed_policy = ?self.config.malformed_policy,
            "Starting phonetic index build"
        );
        Ok(())
    }

    fn stream(&mut self) -> Result<(), BuildError> {
        self.state = BuildState::Streaming;
        let repository = self.repository;
        let places = repository
            .stream_all()
            .map_err(|e| self.source_failure(e))?;

        for item in places {
            self.state = BuildState::Streaming;
            self.progress.inc(1);

            let place = match item {
                Ok(place) => place,
                Err(SourceError::Malformed { offset, reason }) => {
                    self.malformed(None, format!("record {}: {}", offset, reason))?;
                    continue;
                }
                Err(SourceError::Read(e)) => {
                    return Err(self.fail(None, FailureCause::Source(e)));
                }
            };

            self.process(&place)?;

            if self.metrics.records as usize >= self.config.batch_size {
                self.commit(BuildState::Commit)?;
            }
        }

        Ok(())
    }

    fn process(&mut self, place: &Place) -> Result<(), BuildError> {
        self.state = BuildState::Encode;
        let encoded = match self
            .encoders
            .encode_timed(&place.name, &mut self.metrics.timings)
        {
            Ok(encoded) => encoded,
            Err(e @ EncodeError::Rejected { .. }) => {
                return self.malformed(Some(place.id), e.to_string());
            }
            Err(e) => return Err(self.fail(Some(place.id), FailureCause::Encoder(e))),
        };

        self.state = BuildState::Stage;
        for code in encoded.beider_morse {
            self.writers.beider_morse.append(code, place.id);
        }
        self.writers.nysiis.append(encoded.nysiis, place.id);
        match encoded.soundex {
            Ok(code) => self.writers.soundex.append(code, place.id),
            Err(e) => {
                self.skipped_soundex += 1;
                debug!(place_id = place.id, name = %place.name, "No soundex code: {}", e);
            }
        }

        self.places_processed += 1;
        self.metrics.record_place();
        Ok(())
    }

    /// Apply the malformed-record policy
    fn malformed(&mut self, place_id: Option<i64>, reason: String) -> Result<(), BuildError> {
        match self.config.malformed_policy {
            MalformedPolicy::Skip => {
                self.malformed_records += 1;
                warn!(
                    offset = self.places_processed,
                    place_id = ?place_id,
                    malformed_records = self.malformed_records,
                    "Skipping malformed record: {}",
                    reason
                );
                Ok(())
            }
            MalformedPolicy::Abort => Err(self.fail(place_id, FailureCause::MalformedRecord(reason))),
        }
    }

    /// Commit the staged batch; `stage` is `Commit` or `FinalFlush`
    fn commit(&mut self, stage: BuildState) -> Result<(), BuildError> {
        self.state = stage;
        let checkpoint = CommitPoint {
            batch_index: self.batch_index,
            offset: self.places_processed,
        };

        let started = Instant::now();
        self.sink
            .commit_batch(&self.writers, &checkpoint)
            .map_err(|e| self.fail(None, FailureCause::Persistence(e)))?;
        let commit_time: Duration = started.elapsed();

        let rows = self.writers.clear_all();
        debug!(
            batch_index = checkpoint.batch_index,
            beider_morse_rows = rows.beider_morse,
            nysiis_rows = rows.nysiis,
            soundex_rows = rows.soundex,
            "Cleared committed rows"
        );
        let report = self.metrics.finish(
            checkpoint.batch_index,
            checkpoint.offset,
            commit_time,
            self.skipped_soundex,
        );
        report.log();
        self.batches.push(report);

        self.last_committed = Some(checkpoint.offset);
        self.batch_index += 1;
        Ok(())
    }

    fn source_failure(&mut self, e: SourceError) -> BuildError {
        match e {
            SourceError::Malformed { offset, reason } => self.fail(
                None,
                FailureCause::MalformedRecord(format!("record {}: {}", offset, reason)),
            ),
            SourceError::Read(e) => self.fail(None, FailureCause::Source(e)),
        }
    }

    fn fail(&mut self, place_id: Option<i64>, cause: FailureCause) -> BuildError {
        let stage = self.state;
        self.state = BuildState::Failed;
        self.progress.abandon();

        let error = BuildError {
            stage,
            place_id,
            offset: self.places_processed,
            last_committed: self.last_committed,
            cause,
        };
        tracing::error!("{}", error);
        error
    }
}

//! GeoNames gazetteer loader.
//!
//! Reads the tab-separated GeoNames dump format (plain or `.gz`) and stores
//! the places in the `places` tree. Only the id, name and coordinates are kept.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use flate2::read::GzDecoder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{IngestConfig, MalformedPolicy};
use crate::models::Place;
use crate::store::{IndexStore, StoreError};

const ID_COLUMN: usize = 0;
const NAME_COLUMN: usize = 1;
const LATITUDE_COLUMN: usize = 4;
const LONGITUDE_COLUMN: usize = 5;
const MIN_FIELDS: usize = 6;

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("malformed line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read gazetteer: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to store places: {0}")]
    Store(#[from] StoreError),

    #[error("batch_size must be greater than zero")]
    InvalidBatchSize,
}

/// Streams places out of one GeoNames file
pub struct GazetteerReader {
    records: StringRecordsIntoIter<Box<dyn Read>>,
    line: u64,
}

impl GazetteerReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GazetteerError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| GazetteerError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self::from_reader(reader))
    }

    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        let records = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();

        Self { records, line: 0 }
    }
}

impl Iterator for GazetteerReader {
    type Item = Result<Place, GazetteerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?;
        self.line += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Some(Err(GazetteerError::Csv(e))),
            Err(e) => {
                let line = e.position().map_or(self.line, |p| p.line());
                return Some(Err(GazetteerError::Malformed {
                    line,
                    reason: e.to_string(),
                }));
            }
        };

        if let Some(position) = record.position() {
            self.line = position.line();
        }

        Some(parse_place(&record).map_err(|reason| GazetteerError::Malformed {
            line: self.line,
            reason,
        }))
    }
}

fn parse_place(record: &StringRecord) -> Result<Place, String> {
    if record.len() < MIN_FIELDS {
        return Err(format!(
            "expected at least {} fields, found {}",
            MIN_FIELDS,
            record.len()
        ));
    }

    let id: i64 = record[ID_COLUMN]
        .trim()
        .parse()
        .map_err(|_| format!("invalid id {:?}", &record[ID_COLUMN]))?;

    let name = record[NAME_COLUMN].trim();
    if name.is_empty() {
        return Err(format!("place {} has a blank name", id));
    }

    let latitude: f64 = record[LATITUDE_COLUMN]
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude {:?}", &record[LATITUDE_COLUMN]))?;
    let longitude: f64 = record[LONGITUDE_COLUMN]
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude {:?}", &record[LONGITUDE_COLUMN]))?;

    let place = Place::new(id, name, latitude, longitude);
    if !place.point().is_valid() {
        return Err(format!(
            "coordinates out of range: {}, {}",
            latitude, longitude
        ));
    }
    Ok(place)
}

/// Totals of one ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub inserted: u64,
    pub malformed: u64,
    pub files: u64,
}

/// Load every file into `store`, inserting places in batches
pub fn load_into<P: AsRef<Path>>(
    store: &IndexStore,
    files: &[P],
    config: &IngestConfig,
) -> Result<IngestSummary, GazetteerError> {
    if config.batch_size == 0 {
        return Err(GazetteerError::InvalidBatchSize);
    }

    let mut summary = IngestSummary::default();
    let mut buffer: Vec<Place> = Vec::with_capacity(config.batch_size);

    for path in files {
        let path = path.as_ref();
        info!("Loading gazetteer file {}", path.display());

        let mut file_inserted = 0u64;
        for item in GazetteerReader::open(path)? {
            match item {
                Ok(place) => buffer.push(place),
                Err(GazetteerError::Malformed { line, reason }) => match config.malformed_policy {
                    MalformedPolicy::Skip => {
                        summary.malformed += 1;
                        warn!("{}:{}: skipping malformed line: {}", path.display(), line, reason);
                        continue;
                    }
                    MalformedPolicy::Abort => {
                        return Err(GazetteerError::Malformed { line, reason });
                    }
                },
                Err(e) => return Err(e),
            }

            if buffer.len() >= config.batch_size {
                file_inserted += flush(store, &mut buffer)?;
            }
        }
        file_inserted += flush(store, &mut buffer)?;

        info!("Loaded {} places from {}", file_inserted, path.display());
        summary.inserted += file_inserted;
        summary.files += 1;
    }

    info!(
        inserted = summary.inserted,
        malformed = summary.malformed,
        files = summary.files,
        "Gazetteer ingest complete"
    );
    Ok(summary)
}

fn flush(store: &IndexStore, buffer: &mut Vec<Place>) -> Result<u64, GazetteerError> {
    if buffer.is_empty() {
        return Ok(0);
    }

    let count = store.insert_places(buffer)?;
    debug!("Inserted {} places", count);
    buffer.clear();
    Ok(count as u64)
}

//! sled-backed place store and per-algorithm code indices.
//!
//! Layout:
//! - `places`: id key -> JSON `Place`
//! - `codes/<algorithm>`: `code ‖ 0x00 ‖ id key` -> empty value
//! - `meta`: commit checkpoint and last build record
//!
//! Id keys are big-endian with the sign bit flipped so byte order equals
//! numeric order.

mod writer;

pub use writer::{BatchIndexWriter, IndexRow, WriterSet};

use std::path::Path;

use chrono::{DateTime, Utc};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionError;
use sled::{Batch, Db, Transactional, Tree};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::models::{Algorithm, CodeCounts, PhoneticCode, Place};

const PLACES_TREE: &str = "places";
const META_TREE: &str = "meta";
const COMMITTED_KEY: &[u8] = b"committed_offset";
const LAST_BUILD_KEY: &[u8] = b"last_build";
const ROW_SEPARATOR: u8 = 0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction aborted: {0}")]
    Aborted(String),

    #[error("corrupt row in tree {tree}")]
    CorruptRow { tree: &'static str },
}

/// Errors while streaming places out of a repository
#[derive(Debug, Error)]
pub enum SourceError {
    /// One record is unusable; the stream can continue
    #[error("malformed source record at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    /// The source itself failed
    #[error("failed to read source: {0}")]
    Read(#[from] StoreError),
}

pub type PlaceStream<'a> = Box<dyn Iterator<Item = Result<Place, SourceError>> + 'a>;

/// Ordered, read-only source of places
pub trait PlaceRepository {
    fn stream_all(&self) -> Result<PlaceStream<'_>, SourceError>;
}

/// Position of a committed batch in the place stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPoint {
    pub batch_index: u64,
    /// Places processed when the batch was committed
    pub offset: u64,
}

/// Outcome of a completed build, kept in the `meta` tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub completed_at: DateTime<Utc>,
    pub places_processed: u64,
    pub batches_committed: u64,
    pub codes: CodeCounts,
    pub skipped_soundex: u64,
    pub malformed_records: u64,
}

/// Destination of the code indices
pub trait IndexSink {
    fn indices_empty(&self) -> Result<bool, StoreError>;

    fn truncate_indices(&self) -> Result<(), StoreError>;

    /// Persist all staged rows of `writers` atomically across the three
    /// indices, together with `checkpoint`. On error nothing is visible.
    fn commit_batch(&self, writers: &WriterSet, checkpoint: &CommitPoint) -> Result<(), StoreError>;

    fn record_build(&self, record: &BuildRecord) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct IndexStore {
    db: Db,
    places: Tree,
    beider_morse: Tree,
    nysiis: Tree,
    soundex: Tree,
    meta: Tree,
}

impl IndexStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!("Opening sled store at {}", path.display());
        let db = sled::open(path)?;

        Ok(Self {
            places: db.open_tree(PLACES_TREE)?,
            beider_morse: db.open_tree(Algorithm::BeiderMorse.tree_name())?,
            nysiis: db.open_tree(Algorithm::Nysiis.tree_name())?,
            soundex: db.open_tree(Algorithm::Soundex.tree_name())?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    pub fn open_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open(&config.path)
    }

    fn tree(&self, algorithm: Algorithm) -> &Tree {
        match algorithm {
            Algorithm::BeiderMorse => &self.beider_morse,
            Algorithm::Nysiis => &self.nysiis,
            Algorithm::Soundex => &self.soundex,
        }
    }

    /// Insert (or replace) places in one atomic batch
    pub fn insert_places(&self, places: &[Place]) -> Result<usize, StoreError> {
        if places.is_empty() {
            return Ok(0);
        }

        let mut batch = Batch::default();
        for place in places {
            batch.insert(&id_key(place.id)[..], serde_json::to_vec(place)?);
        }
        self.places.apply_batch(batch)?;
        self.db.flush()?;
        Ok(places.len())
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    pub fn place(&self, id: i64) -> Result<Option<Place>, StoreError> {
        match self.places.get(id_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Places for `ids` ordered by id; unknown ids are ignored
    pub fn places_by_ids<I>(&self, ids: I) -> Result<Vec<Place>, StoreError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut places = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(place) = self.place(id)? {
                places.push(place);
            }
        }
        Ok(places)
    }

    /// Exact-code lookup: ids of every place that produced `code`
    pub fn lookup(&self, algorithm: Algorithm, code: &str) -> Result<HashSet<i64>, StoreError> {
        let mut prefix = Vec::with_capacity(code.len() + 1);
        prefix.extend_from_slice(code.as_bytes());
        prefix.push(ROW_SEPARATOR);

        let mut ids = HashSet::new();
        for entry in self.tree(algorithm).scan_prefix(&prefix) {
            let (key, _) = entry?;
            let (_, id) = decode_row_key(&key).ok_or(StoreError::CorruptRow {
                tree: algorithm.tree_name(),
            })?;
            ids.insert(id);
        }
        Ok(ids)
    }

    /// Rows stored under `code`, ordered by place id
    pub fn lookup_codes(
        &self,
        algorithm: Algorithm,
        code: &str,
    ) -> Result<Vec<PhoneticCode>, StoreError> {
        let mut place_ids: Vec<i64> = self.lookup(algorithm, code)?.into_iter().collect();
        place_ids.sort_unstable();

        Ok(place_ids
            .into_iter()
            .map(|place_id| PhoneticCode {
                code: code.to_string(),
                place_id,
                algorithm,
            })
            .collect())
    }

    /// Places whose name equals `name` ignoring case, ordered by id.
    ///
    /// Scans the whole `places` tree; undecodable entries are skipped.
    pub fn places_named(&self, name: &str) -> Result<Vec<Place>, StoreError> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut places = Vec::new();
        for entry in self.places.iter() {
            let (_, value) = entry?;
            match serde_json::from_slice::<Place>(&value) {
                Ok(place) if place.name.trim().to_lowercase() == wanted => places.push(place),
                Ok(_) => {}
                Err(e) => debug!("Skipping undecodable place: {}", e),
            }
        }
        Ok(places)
    }

    /// Every row of one index, in key order
    pub fn rows(&self, algorithm: Algorithm) -> Result<Vec<IndexRow>, StoreError> {
        let mut rows = Vec::new();
        for entry in self.tree(algorithm).iter() {
            let (key, _) = entry?;
            let (code, place_id) = decode_row_key(&key).ok_or(StoreError::CorruptRow {
                tree: algorithm.tree_name(),
            })?;
            rows.push(IndexRow { code, place_id });
        }
        Ok(rows)
    }

    pub fn row_count(&self, algorithm: Algorithm) -> usize {
        self.tree(algorithm).len()
    }

    pub fn row_counts(&self) -> CodeCounts {
        let mut counts = CodeCounts::default();
        for algorithm in Algorithm::ALL {
            counts.add(algorithm, self.row_count(algorithm) as u64);
        }
        counts
    }

    /// Checkpoint of the last committed batch, if any
    pub fn committed_point(&self) -> Result<Option<CommitPoint>, StoreError> {
        match self.meta.get(COMMITTED_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn last_build(&self) -> Result<Option<BuildRecord>, StoreError> {
        match self.meta.get(LAST_BUILD_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_raw_place(&self, id: i64, value: &[u8]) -> Result<(), StoreError> {
        self.places.insert(id_key(id), value)?;
        Ok(())
    }
}

impl PlaceRepository for IndexStore {
    fn stream_all(&self) -> Result<PlaceStream<'_>, SourceError> {
        let stream = self
            .places
            .iter()
            .enumerate()
            .map(|(offset, entry)| {
                let (key, value) = entry.map_err(StoreError::from)?;
                decode_place(offset as u64, &key, &value)
            });
        Ok(Box::new(stream))
    }
}

impl IndexSink for IndexStore {
    fn indices_empty(&self) -> Result<bool, StoreError> {
        Ok(Algorithm::ALL
            .iter()
            .all(|algorithm| self.tree(*algorithm).is_empty()))
    }

    fn truncate_indices(&self) -> Result<(), StoreError> {
        for algorithm in Algorithm::ALL {
            self.tree(algorithm).clear()?;
        }
        self.meta.remove(COMMITTED_KEY)?;
        self.db.flush()?;
        info!("Truncated phonetic code indices");
        Ok(())
    }

    fn commit_batch(&self, writers: &WriterSet, checkpoint: &CommitPoint) -> Result<(), StoreError> {
        let checkpoint_bytes = serde_json::to_vec(checkpoint)?;

        let result: Result<(), TransactionError<()>> =
            (&self.beider_morse, &self.nysiis, &self.soundex, &self.meta).transaction(
                |(beider_morse, nysiis, soundex, meta)| {
                    writers.beider_morse.flush(beider_morse)?;
                    writers.nysiis.flush(nysiis)?;
                    writers.soundex.flush(soundex)?;
                    meta.insert(COMMITTED_KEY, checkpoint_bytes.as_slice())?;
                    Ok(())
                },
            );

        match result {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(StoreError::Sled(e)),
            Err(TransactionError::Abort(())) => {
                return Err(StoreError::Aborted(format!(
                    "batch {} was aborted",
                    checkpoint.batch_index
                )))
            }
        }

        self.db.flush()?;
        Ok(())
    }

    fn record_build(&self, record: &BuildRecord) -> Result<(), StoreError> {
        self.meta.insert(LAST_BUILD_KEY, serde_json::to_vec(record)?)?;
        self.db.flush()?;
        Ok(())
    }
}

fn decode_place(offset: u64, key: &[u8], value: &[u8]) -> Result<Place, SourceError> {
    let malformed = |reason: String| SourceError::Malformed { offset, reason };

    let place: Place =
        serde_json::from_slice(value).map_err(|e| malformed(format!("undecodable place: {}", e)))?;

    if key != &id_key(place.id)[..] {
        return Err(malformed(format!("place {} stored under a foreign key", place.id)));
    }
    if place.name.trim().is_empty() {
        return Err(malformed(format!("place {} has a blank name", place.id)));
    }
    Ok(place)
}

pub(crate) fn id_key(id: i64) -> [u8; 8] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

fn id_from_key(bytes: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
}

pub(crate) fn row_key(code: &str, place_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(code.len() + 9);
    key.extend_from_slice(code.as_bytes());
    key.push(ROW_SEPARATOR);
    key.extend_from_slice(&id_key(place_id));
    key
}

fn decode_row_key(key: &[u8]) -> Option<(String, i64)> {
    let split = key.len().checked_sub(9)?;
    if key[split] != ROW_SEPARATOR {
        return None;
    }
    let code = std::str::from_utf8(&key[..split]).ok()?.to_string();
    let id = id_from_key(&key[split + 1..])?;
    Some((code, id))
}

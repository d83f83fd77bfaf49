//! Buffered per-algorithm index writers.

use serde::Serialize;
use sled::transaction::{TransactionalTree, UnabortableTransactionError};
use sled::Batch;
use tracing::debug;

use super::row_key;
use crate::models::{Algorithm, CodeCounts};

/// A (code, place) row of one index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexRow {
    pub code: String,
    pub place_id: i64,
}

/// Stages rows for one algorithm's index until the enclosing batch commits
pub struct BatchIndexWriter {
    algorithm: Algorithm,
    buffer: Vec<IndexRow>,
    total_written: u64,
}

impl BatchIndexWriter {
    pub fn new(algorithm: Algorithm, capacity: usize) -> Self {
        Self {
            algorithm,
            buffer: Vec::with_capacity(capacity),
            total_written: 0,
        }
    }

    pub fn append(&mut self, code: String, place_id: i64) {
        self.buffer.push(IndexRow { code, place_id });
    }

    /// Rows staged since the last commit
    pub fn staged(&self) -> usize {
        self.buffer.len()
    }

    pub fn rows(&self) -> &[IndexRow] {
        &self.buffer
    }

    /// Write every staged row into `tree` as one batch.
    ///
    /// Staged rows are kept; the transaction may run this more than once.
    pub fn flush(&self, tree: &TransactionalTree) -> Result<(), UnabortableTransactionError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut batch = Batch::default();
        for row in &self.buffer {
            batch.insert(row_key(&row.code, row.place_id), Vec::<u8>::new());
        }

        debug!("Writing {} {} rows", self.buffer.len(), self.algorithm);
        tree.apply_batch(&batch)
    }

    /// Drop staged rows after a successful commit, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.buffer.len();
        self.total_written += count as u64;
        self.buffer.clear();
        count
    }

    /// Rows committed through this writer over its lifetime
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

/// The three writers a batch commits together
pub struct WriterSet {
    pub beider_morse: BatchIndexWriter,
    pub nysiis: BatchIndexWriter,
    pub soundex: BatchIndexWriter,
}

impl WriterSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            beider_morse: BatchIndexWriter::new(Algorithm::BeiderMorse, capacity),
            nysiis: BatchIndexWriter::new(Algorithm::Nysiis, capacity),
            soundex: BatchIndexWriter::new(Algorithm::Soundex, capacity),
        }
    }

    pub fn writer(&self, algorithm: Algorithm) -> &BatchIndexWriter {
        match algorithm {
            Algorithm::BeiderMorse => &self.beider_morse,
            Algorithm::Nysiis => &self.nysiis,
            Algorithm::Soundex => &self.soundex,
        }
    }

    pub fn writer_mut(&mut self, algorithm: Algorithm) -> &mut BatchIndexWriter {
        match algorithm {
            Algorithm::BeiderMorse => &mut self.beider_morse,
            Algorithm::Nysiis => &mut self.nysiis,
            Algorithm::Soundex => &mut self.soundex,
        }
    }

    pub fn staged(&self) -> usize {
        self.beider_morse.staged() + self.nysiis.staged() + self.soundex.staged()
    }

    pub fn is_empty(&self) -> bool {
        self.staged() == 0
    }

    /// Rows committed through each writer over its lifetime
    pub fn total_written(&self) -> CodeCounts {
        let mut counts = CodeCounts::default();
        for algorithm in Algorithm::ALL {
            counts.add(algorithm, self.writer(algorithm).total_written());
        }
        counts
    }

    /// Clear all three writers, returning the rows each had committed
    pub fn clear_all(&mut self) -> CodeCounts {
        let mut counts = CodeCounts::default();
        for algorithm in Algorithm::ALL {
            let cleared = self.writer_mut(algorithm).clear();
            counts.add(algorithm, cleared as u64);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_clear() {
        let mut writer = BatchIndexWriter::new(Algorithm::Nysiis, 4);
        writer.append("NARC".to_string(), 1);
        writer.append("BASTAN".to_string(), 2);
        assert_eq!(writer.staged(), 2);
        assert_eq!(writer.rows()[1].code, "BASTAN");
        assert_eq!(writer.rows()[0].place_id, 1);

        assert_eq!(writer.clear(), 2);
        assert_eq!(writer.staged(), 0);
        assert_eq!(writer.total_written(), 2);
    }

    #[test]
    fn test_writer_set_clear_all() {
        let mut writers = WriterSet::new(8);
        writers.beider_morse.append("xikago".to_string(), 5);
        writers.beider_morse.append("tSikago".to_string(), 5);
        writers.nysiis.append("CACAG".to_string(), 5);
        assert_eq!(writers.staged(), 3);
        assert_eq!(writers.writer(Algorithm::Soundex).staged(), 0);

        let counts = writers.clear_all();
        assert_eq!(
            counts,
            CodeCounts {
                beider_morse: 2,
                nysiis: 1,
                soundex: 0
            }
        );
        assert!(writers.is_empty());

        writers.nysiis.append("NARC".to_string(), 6);
        writers.clear_all();
        assert_eq!(
            writers.total_written(),
            CodeCounts {
                beider_morse: 2,
                nysiis: 2,
                soundex: 0
            }
        );
    }
}

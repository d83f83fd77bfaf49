//! Per-batch timing and the batch log event.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::phonetic::EncodeTimings;

/// Encode timings of the batch currently being filled. Owned by one run.
#[derive(Debug, Default)]
pub struct BatchMetrics {
    pub timings: EncodeTimings,
    pub records: u64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_place(&mut self) {
        self.records += 1;
    }

    /// Close the batch and start the next one from zero
    pub fn finish(
        &mut self,
        batch_index: u64,
        processed_count: u64,
        commit: Duration,
        skipped_soundex_count: u64,
    ) -> BatchReport {
        let report = BatchReport {
            batch_index,
            processed_count,
            batch_records: self.records,
            beider_morse_encode_millis: self.timings.beider_morse.as_millis() as u64,
            nysiis_encode_millis: self.timings.nysiis.as_millis() as u64,
            soundex_encode_millis: self.timings.soundex.as_millis() as u64,
            commit_millis: commit.as_millis() as u64,
            skipped_soundex_count,
        };

        self.timings.reset();
        self.records = 0;
        report
    }
}

/// What was committed in one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_index: u64,
    /// Places processed so far in the run, including this batch
    pub processed_count: u64,
    pub batch_records: u64,
    pub beider_morse_encode_millis: u64,
    pub nysiis_encode_millis: u64,
    pub soundex_encode_millis: u64,
    pub commit_millis: u64,
    /// Running total for the run
    pub skipped_soundex_count: u64,
}

impl BatchReport {
    pub fn log(&self) {
        info!(
            batch_index = self.batch_index,
            processed_count = self.processed_count,
            batch_records = self.batch_records,
            beider_morse_encode_millis = self.beider_morse_encode_millis,
            nysiis_encode_millis = self.nysiis_encode_millis,
            soundex_encode_millis = self.soundex_encode_millis,
            commit_millis = self.commit_millis,
            skipped_soundex_count = self.skipped_soundex_count,
            "Committed batch"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_resets_batch() {
        let mut metrics = BatchMetrics::new();
        metrics.timings.nysiis = Duration::from_millis(12);
        metrics.timings.beider_morse = Duration::from_micros(2_500);
        metrics.record_place();
        metrics.record_place();

        let report = metrics.finish(3, 4002, Duration::from_millis(40), 7);
        assert_eq!(report.batch_index, 3);
        assert_eq!(report.processed_count, 4002);
        assert_eq!(report.batch_records, 2);
        assert_eq!(report.nysiis_encode_millis, 12);
        assert_eq!(report.beider_morse_encode_millis, 2);
        assert_eq!(report.commit_millis, 40);
        assert_eq!(report.skipped_soundex_count, 7);

        assert_eq!(metrics.records, 0);
        assert_eq!(metrics.timings, EncodeTimings::default());
    }

    #[test]
    fn test_report_field_names() {
        let report = BatchMetrics::new().finish(0, 0, Duration::ZERO, 0);
        let json = serde_json::to_value(&report).unwrap();
        for field in [
            "batch_index",
            "processed_count",
            "beider_morse_encode_millis",
            "nysiis_encode_millis",
            "soundex_encode_millis",
            "commit_millis",
            "skipped_soundex_count",
        ] {
            assert!(json.get(field).is_some(), "{}", field);
        }
    }
}

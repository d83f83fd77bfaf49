//! Phonetic encoders for place names.
//!
//! The three algorithms have different contracts:
//! - Beider-Morse: one or more codes for any non-blank name.
//! - NYSIIS: exactly one non-empty code for any non-blank name.
//! - Soundex: exactly one code, or [`EncodingUnsupported`] when the name has no
//!   letters or a letter outside A-Z. That outcome is expected and per-record.
//!
//! A blank name (nothing but whitespace and [`ALTERNATE_SEPARATOR`]) is the
//! only input Beider-Morse and NYSIIS refuse; it is reported as
//! [`EncodeError::Rejected`]. A code that breaks an algorithm's
//! postcondition is [`EncodeError::Internal`].

mod beider_morse;
mod nysiis;
mod soundex;

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::models::Algorithm;

pub use beider_morse::{beider_morse, split_alternates, ALTERNATE_SEPARATOR, MAX_PHONEMES};
pub use nysiis::nysiis;
pub use soundex::soundex;

/// Soundex has no code for this name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingUnsupported {
    #[error("name has no letters to encode")]
    NoLetters,
    #[error("character {0:?} has no soundex mapping")]
    UnmappedCharacter(char),
}

/// Failure of one of the always-succeeding algorithms
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{algorithm} cannot encode {name:?}: {reason}")]
    Rejected {
        algorithm: Algorithm,
        name: String,
        reason: &'static str,
    },
    #[error("{algorithm} produced an invalid code for {name:?}: {reason}")]
    Internal {
        algorithm: Algorithm,
        name: String,
        reason: String,
    },
}

/// All codes computed for one name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedName {
    pub beider_morse: Vec<String>,
    pub nysiis: String,
    pub soundex: Result<String, EncodingUnsupported>,
}

impl EncodedName {
    /// Number of index rows this name contributes per algorithm
    pub fn code_counts(&self) -> [(Algorithm, usize); 3] {
        [
            (Algorithm::BeiderMorse, self.beider_morse.len()),
            (Algorithm::Nysiis, 1),
            (Algorithm::Soundex, usize::from(self.soundex.is_ok())),
        ]
    }
}

/// Time spent in each encoder
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncodeTimings {
    pub beider_morse: Duration,
    pub nysiis: Duration,
    pub soundex: Duration,
}

impl EncodeTimings {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The encoders applied to every place name. Stateless and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneticEncoderSet;

impl PhoneticEncoderSet {
    pub fn new() -> Self {
        Self
    }

    /// Encode `name` with all three algorithms.
    ///
    /// Soundex never fails the call; its outcome is carried in
    /// [`EncodedName::soundex`].
    pub fn encode(&self, name: &str) -> Result<EncodedName, EncodeError> {
        self.encode_timed(name, &mut EncodeTimings::default())
    }

    /// Like [`encode`](Self::encode), adding each algorithm's elapsed time to `timings`.
    pub fn encode_timed(
        &self,
        name: &str,
        timings: &mut EncodeTimings,
    ) -> Result<EncodedName, EncodeError> {
        let started = Instant::now();
        let beider_morse = self.beider_morse(name);
        timings.beider_morse += started.elapsed();

        let started = Instant::now();
        let nysiis = self.nysiis(name);
        timings.nysiis += started.elapsed();

        let started = Instant::now();
        let soundex = self.soundex(name);
        timings.soundex += started.elapsed();

        Ok(EncodedName {
            beider_morse: beider_morse?,
            nysiis: nysiis?,
            soundex,
        })
    }

    /// Beider-Morse alternates, split on the literal separator.
    pub fn beider_morse(&self, name: &str) -> Result<Vec<String>, EncodeError> {
        let encoded = beider_morse(name)
            .filter(|_| !is_blank(name))
            .ok_or_else(|| EncodeError::Rejected {
                algorithm: Algorithm::BeiderMorse,
                name: name.to_string(),
                reason: "name is blank",
            })?;

        let codes: Vec<String> = split_alternates(&encoded).map(str::to_string).collect();
        if codes.iter().any(String::is_empty) {
            return Err(EncodeError::Internal {
                algorithm: Algorithm::BeiderMorse,
                name: name.to_string(),
                reason: format!("empty alternate in {:?}", encoded),
            });
        }
        Ok(codes)
    }

    pub fn nysiis(&self, name: &str) -> Result<String, EncodeError> {
        let code = nysiis(name)
            .filter(|_| !is_blank(name))
            .ok_or_else(|| EncodeError::Rejected {
                algorithm: Algorithm::Nysiis,
                name: name.to_string(),
                reason: "name is blank",
            })?;

        if code.is_empty() {
            return Err(EncodeError::Internal {
                algorithm: Algorithm::Nysiis,
                name: name.to_string(),
                reason: "empty code".to_string(),
            });
        }
        Ok(code)
    }

    pub fn soundex(&self, name: &str) -> Result<String, EncodingUnsupported> {
        soundex(name)
    }
}

fn is_blank(name: &str) -> bool {
    name.chars().all(|c| c.is_whitespace() || c == ALTERNATE_SEPARATOR)
}

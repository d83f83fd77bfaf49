//! Resolves a typed word to places through the persisted code indices.

use hashbrown::HashSet;
use serde::Serialize;
use tracing::debug;

use crate::models::{Algorithm, Place};
use crate::phonetic::PhoneticEncoderSet;
use crate::store::{IndexStore, StoreError};

/// Which candidate set produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Places named exactly `word`, ignoring case
    Exact,
    /// Places matched by both NYSIIS and Beider-Morse
    Intersection,
    /// Places matched by either NYSIIS or Beider-Morse
    Union,
    /// Neither matched; Soundex was used
    Soundex,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub strategy: MatchStrategy,
    /// Ordered by id
    pub places: Vec<Place>,
}

pub struct PhoneticMatcher<'a> {
    store: &'a IndexStore,
    encoders: PhoneticEncoderSet,
}

impl<'a> PhoneticMatcher<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self {
            store,
            encoders: PhoneticEncoderSet::new(),
        }
    }

    /// Place ids matching `word`, with the strategy that selected them
    pub fn match_ids(&self, word: &str) -> Result<(MatchStrategy, HashSet<i64>), StoreError> {
        let exact = self.store.places_named(word)?;
        if !exact.is_empty() {
            return Ok((MatchStrategy::Exact, exact.iter().map(|p| p.id).collect()));
        }
        self.phonetic_ids(word)
    }

    pub fn match_word(&self, word: &str) -> Result<MatchOutcome, StoreError> {
        let exact = self.store.places_named(word)?;
        if !exact.is_empty() {
            return Ok(MatchOutcome {
                strategy: MatchStrategy::Exact,
                places: exact,
            });
        }

        let (strategy, ids) = self.phonetic_ids(word)?;
        Ok(MatchOutcome {
            strategy,
            places: self.store.places_by_ids(ids)?,
        })
    }

    fn phonetic_ids(&self, word: &str) -> Result<(MatchStrategy, HashSet<i64>), StoreError> {
        let nysiis = match self.encoders.nysiis(word) {
            Ok(code) => self.store.lookup(Algorithm::Nysiis, &code)?,
            Err(_) => HashSet::new(),
        };

        let mut beider_morse = HashSet::new();
        if let Ok(codes) = self.encoders.beider_morse(word) {
            for code in codes {
                beider_morse.extend(self.store.lookup(Algorithm::BeiderMorse, &code)?);
            }
        }

        debug!(
            word,
            nysiis = nysiis.len(),
            beider_morse = beider_morse.len(),
            "Phonetic candidates"
        );

        if nysiis.is_empty() && beider_morse.is_empty() {
            let ids = match self.encoders.soundex(word) {
                Ok(code) => self.store.lookup(Algorithm::Soundex, &code)?,
                Err(_) => HashSet::new(),
            };
            return Ok((MatchStrategy::Soundex, ids));
        }

        let both: HashSet<i64> = nysiis.intersection(&beider_morse).copied().collect();
        if both.is_empty() {
            let either: HashSet<i64> = nysiis.union(&beider_morse).copied().collect();
            Ok((MatchStrategy::Union, either))
        } else {
            Ok((MatchStrategy::Intersection, both))
        }
    }
}

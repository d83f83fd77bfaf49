//! Phonetic algorithm identifiers and index rows.

use serde::{Deserialize, Serialize};

/// Phonetic algorithm a code was produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    BeiderMorse,
    Nysiis,
    Soundex,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::BeiderMorse, Algorithm::Nysiis, Algorithm::Soundex];

    /// Name of the sled tree holding this algorithm's index
    pub fn tree_name(&self) -> &'static str {
        match self {
            Algorithm::BeiderMorse => "codes/beider_morse",
            Algorithm::Nysiis => "codes/nysiis",
            Algorithm::Soundex => "codes/soundex",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::BeiderMorse => write!(f, "beider_morse"),
            Algorithm::Nysiis => write!(f, "nysiis"),
            Algorithm::Soundex => write!(f, "soundex"),
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "beider_morse" | "bm" => Ok(Algorithm::BeiderMorse),
            "nysiis" => Ok(Algorithm::Nysiis),
            "soundex" => Ok(Algorithm::Soundex),
            other => Err(format!("unknown phonetic algorithm: {}", other)),
        }
    }
}

/// One persisted (code, place) row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneticCode {
    pub code: String,
    pub place_id: i64,
    pub algorithm: Algorithm,
}

/// Row counts per algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCounts {
    pub beider_morse: u64,
    pub nysiis: u64,
    pub soundex: u64,
}

impl CodeCounts {
    pub fn get(&self, algorithm: Algorithm) -> u64 {
        match algorithm {
            Algorithm::BeiderMorse => self.beider_morse,
            Algorithm::Nysiis => self.nysiis,
            Algorithm::Soundex => self.soundex,
        }
    }

    pub fn add(&mut self, algorithm: Algorithm, count: u64) {
        match algorithm {
            Algorithm::BeiderMorse => self.beider_morse += count,
            Algorithm::Nysiis => self.nysiis += count,
            Algorithm::Soundex => self.soundex += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.beider_morse + self.nysiis + self.soundex
    }
}

impl std::ops::AddAssign for CodeCounts {
    fn add_assign(&mut self, other: Self) {
        for algorithm in Algorithm::ALL {
            self.add(algorithm, other.get(algorithm));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("nysiis".parse::<Algorithm>(), Ok(Algorithm::Nysiis));
        assert_eq!("Beider-Morse".parse::<Algorithm>(), Ok(Algorithm::BeiderMorse));
        assert_eq!("SOUNDEX".parse::<Algorithm>(), Ok(Algorithm::Soundex));
        assert!("metaphone".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_code_counts() {
        let mut counts = CodeCounts::default();
        counts.add(Algorithm::BeiderMorse, 3);
        counts.add(Algorithm::Nysiis, 1);
        counts += CodeCounts {
            beider_morse: 1,
            nysiis: 1,
            soundex: 1,
        };
        assert_eq!(counts.get(Algorithm::BeiderMorse), 4);
        assert_eq!(counts.get(Algorithm::Soundex), 1);
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn test_display_matches_serde() {
        for algorithm in Algorithm::ALL {
            let json = serde_json::to_value(algorithm).unwrap();
            assert_eq!(json, algorithm.to_string());
        }
    }
}

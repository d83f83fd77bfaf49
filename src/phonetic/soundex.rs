//! American Soundex.
//!
//! The first letter is kept, the following consonants map to digit classes,
//! H and W do not separate equal classes, and the code is padded to four
//! characters. Only A-Z have a mapping.

use super::EncodingUnsupported;

/// Digit class for A..Z. Vowels and Y map to '0' and never appear in a code.
const MAPPING: &[u8; 26] = b"01230120022455012623010202";

const CODE_LEN: usize = 4;

/// Soundex code for `name`, e.g. "Robert" and "Rupert" both give "R163".
pub fn soundex(name: &str) -> Result<String, EncodingUnsupported> {
    let letters: Vec<char> = name
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();

    if letters.is_empty() {
        return Err(EncodingUnsupported::NoLetters);
    }
    if let Some(&c) = letters.iter().find(|c| !c.is_ascii_uppercase()) {
        return Err(EncodingUnsupported::UnmappedCharacter(c));
    }

    let first = letters[0];
    let mut code = String::with_capacity(CODE_LEN);
    code.push(first);
    let mut last = digit(first);

    for &ch in &letters[1..] {
        if code.len() == CODE_LEN {
            break;
        }
        if ch == 'H' || ch == 'W' {
            continue;
        }
        let d = digit(ch);
        if d != '0' && d != last {
            code.push(d);
        }
        last = d;
    }

    while code.len() < CODE_LEN {
        code.push('0');
    }

    Ok(code)
}

fn digit(c: char) -> char {
    MAPPING[(c as u8 - b'A') as usize] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_codes() {
        assert_eq!(soundex("Robert").unwrap(), "R163");
        assert_eq!(soundex("Rupert").unwrap(), "R163");
        assert_eq!(soundex("Newark").unwrap(), "N620");
        assert_eq!(soundex("Boston").unwrap(), "B235");
    }

    #[test]
    fn test_h_and_w_do_not_separate() {
        assert_eq!(soundex("Ashcraft").unwrap(), "A261");
        assert_eq!(soundex("Tymczak").unwrap(), "T522");
        assert_eq!(soundex("Pfister").unwrap(), "P236");
    }

    #[test]
    fn test_ignores_punctuation_and_case() {
        assert_eq!(soundex("st. louis").unwrap(), "S342");
        assert_eq!(soundex("O'Brien").unwrap(), "O165");
    }

    #[test]
    fn test_no_letters_is_unsupported() {
        assert_eq!(soundex("12345"), Err(EncodingUnsupported::NoLetters));
        assert_eq!(soundex(""), Err(EncodingUnsupported::NoLetters));
    }

    #[test]
    fn test_unmapped_letter_is_unsupported() {
        assert_eq!(
            soundex("Ærøskøbing"),
            Err(EncodingUnsupported::UnmappedCharacter('Æ'))
        );
        assert_eq!(
            soundex("Zürich"),
            Err(EncodingUnsupported::UnmappedCharacter('Ü'))
        );
    }
}

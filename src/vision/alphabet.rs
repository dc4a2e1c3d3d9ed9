//! Character alphabets mapping class indices to symbols

use crate::error::SolverError;

const DIGITS: &str = "0123456789";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Ordered symbol set indexed by model class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::alphanumeric()
    }
}

impl Alphabet {
    /// Build from an explicit symbol string. Symbols must be unique.
    pub fn new(symbols: &str) -> Result<Self, SolverError> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(SolverError::Config("alphabet is empty".into()));
        }
        for (i, c) in symbols.iter().enumerate() {
            if symbols[..i].contains(c) {
                return Err(SolverError::Config(format!(
                    "alphabet contains duplicate symbol '{}'",
                    c
                )));
            }
        }
        Ok(Self { symbols })
    }

    fn from_parts(parts: &[&str]) -> Self {
        Self {
            symbols: parts.iter().flat_map(|p| p.chars()).collect(),
        }
    }

    /// Digits, lowercase, uppercase (62 symbols)
    pub fn alphanumeric() -> Self {
        Self::from_parts(&[DIGITS, LOWERCASE, UPPERCASE])
    }

    /// Lowercase, uppercase, digits (62 symbols)
    pub fn letters_then_digits() -> Self {
        Self::from_parts(&[LOWERCASE, UPPERCASE, DIGITS])
    }

    /// Lowercase then digits (36 symbols)
    pub fn lowercase_digits() -> Self {
        Self::from_parts(&[LOWERCASE, DIGITS])
    }

    /// Uppercase then digits (36 symbols)
    pub fn uppercase_digits() -> Self {
        Self::from_parts(&[UPPERCASE, DIGITS])
    }

    /// Digits only
    pub fn digits() -> Self {
        Self::from_parts(&[DIGITS])
    }

    /// Number of real symbols (blank/stop classes excluded)
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Class index one past the last symbol, used as the CTC blank
    pub fn blank_index(&self) -> usize {
        self.symbols.len()
    }

    /// Symbol for a class index, `None` when out of bounds
    pub fn get(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    /// Symbols as a string
    pub fn as_string(&self) -> String {
        self.symbols.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_alphabet_layout() {
        let alphabet = Alphabet::default();
        assert_eq!(alphabet.len(), 62);
        assert_eq!(alphabet.blank_index(), 62);
        assert_eq!(alphabet.get(0), Some('0'));
        assert_eq!(alphabet.get(10), Some('a'));
        assert_eq!(alphabet.get(36), Some('A'));
        assert_eq!(alphabet.get(61), Some('Z'));
        assert_eq!(alphabet.get(62), None);
    }

    #[test]
    fn test_variant_sizes() {
        assert_eq!(Alphabet::letters_then_digits().len(), 62);
        assert_eq!(Alphabet::uppercase_digits().len(), 36);
        assert_eq!(Alphabet::lowercase_digits().len(), 36);
        assert_eq!(Alphabet::lowercase_digits().get(25), Some('z'));
        assert_eq!(Alphabet::lowercase_digits().get(26), Some('0'));
        assert_eq!(Alphabet::digits().len(), 10);
        assert_eq!(Alphabet::letters_then_digits().get(0), Some('a'));
        assert_eq!(Alphabet::uppercase_digits().get(26), Some('0'));
    }

    #[test]
    fn test_custom_alphabet() {
        let alphabet = Alphabet::new("XYZ").unwrap();
        assert_eq!(alphabet.blank_index(), 3);
        assert_eq!(alphabet.as_string(), "XYZ");
    }

    #[test]
    fn test_invalid_custom_alphabets() {
        assert!(Alphabet::new("").is_err());
        assert!(Alphabet::new("abca").is_err());
    }
}

//! Fractional index keys for user-reorderable lists
//!
//! A key is a string over an ordered alphabet, compared lexicographically.
//! Between any two distinct valid keys there is always room for another key,
//! which is what lets a reorder touch a single row instead of renumbering the
//! whole list. Repeated inserts into the same gap make keys longer; nothing
//! here ever shortens or rebalances existing keys.

use std::fmt;

use thiserror::Error;

/// The 62 ASCII alphanumerics in byte order
pub const BASE62_SYMBOLS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length above which callers are expected to log a warning about key growth
pub const DEFAULT_KEY_LENGTH_WARNING: usize = 32;

pub type Result<T> = std::result::Result<T, KeyError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// `lower >= upper` was passed. Always a caller bug, never a data problem.
    #[error("Invariant violation: lower bound {lower:?} is not below upper bound {upper:?}")]
    InvariantViolation { lower: String, upper: String },

    #[error("Invalid order key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(&'static str),
}

/// Ordered symbol set the keys are written in.
///
/// Symbols must be ASCII and strictly ascending in byte order, so that the
/// digit order of a key and the byte order of its string agree. New symbols may
/// only be appended above the current maximum; that keeps every existing key
/// valid and ordered the same way.
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: String,
    digits: [Option<u8>; 128],
}

impl Alphabet {
    pub fn new(symbols: &str) -> Result<Self> {
        if !symbols.is_ascii() {
            return Err(KeyError::InvalidAlphabet("symbols must be ASCII"));
        }
        let bytes = symbols.as_bytes();
        if bytes.len() < 2 {
            return Err(KeyError::InvalidAlphabet("at least two symbols are required"));
        }
        if bytes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(KeyError::InvalidAlphabet(
                "symbols must be strictly ascending",
            ));
        }
        Ok(Self::build(symbols))
    }

    /// The default alphanumeric alphabet
    pub fn base62() -> Self {
        Self::build(BASE62_SYMBOLS)
    }

    fn build(symbols: &str) -> Self {
        let mut digits = [None; 128];
        for (digit, byte) in symbols.bytes().enumerate() {
            digits[byte as usize] = Some(digit as u8);
        }
        Self {
            symbols: symbols.to_string(),
            digits,
        }
    }

    pub fn symbols(&self) -> &str {
        &self.symbols
    }

    pub fn base(&self) -> usize {
        self.symbols.len()
    }

    pub fn min_symbol(&self) -> char {
        self.symbols.as_bytes()[0] as char
    }

    /// Check that `key` can be used as a bound.
    ///
    /// A key must be non-empty, written in this alphabet, and must not end with
    /// the minimum symbol: `k` and `k` + min would have nothing between them.
    pub fn validate_key(&self, key: &str) -> Result<()> {
        self.to_digits(key).map(|_| ())
    }

    fn to_digits(&self, key: &str) -> Result<Vec<u8>> {
        let invalid = |reason| KeyError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        let digits = key
            .bytes()
            .map(|b| self.digits.get(b as usize).copied().flatten())
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| invalid("key contains a symbol outside the alphabet"))?;
        if digits.last() == Some(&0) {
            return Err(invalid("key ends with the minimum symbol"));
        }
        Ok(digits)
    }

    fn to_key(&self, digits: &[u8]) -> String {
        let symbols = self.symbols.as_bytes();
        digits.iter().map(|&d| symbols[d as usize] as char).collect()
    }

    /// Generate a key strictly between two optional bounds.
    ///
    /// `None` for `lower` means negative infinity, `None` for `upper` positive
    /// infinity. The result is deterministic: identical bounds always give the
    /// identical key.
    ///
    /// # Arguments
    /// * `lower` - Key the result must sort after, or `None` for no lower bound
    /// * `upper` - Key the result must sort before, or `None` for no upper bound
    ///
    /// # Returns
    /// The new key, or `InvalidKey` / `InvariantViolation` when a bound is
    /// malformed or `lower >= upper`
    pub fn key_between(&self, lower: Option<&str>, upper: Option<&str>) -> Result<String> {
        let lower_digits = lower.map(|k| self.to_digits(k)).transpose()?;
        let upper_digits = upper.map(|k| self.to_digits(k)).transpose()?;

        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo >= hi {
                return Err(KeyError::InvariantViolation {
                    lower: lo.to_string(),
                    upper: hi.to_string(),
                });
            }
        }

        let digits = midpoint(
            lower_digits.as_deref().unwrap_or(&[]),
            upper_digits.as_deref(),
            self.base(),
        );
        Ok(self.to_key(&digits))
    }

    /// Key that sorts before `current_first` (or a seed key for an empty list)
    pub fn first_key(&self, current_first: Option<&str>) -> Result<String> {
        self.key_between(None, current_first)
    }

    /// Key that sorts after `current_last` (or a seed key for an empty list)
    pub fn last_key(&self, current_last: Option<&str>) -> Result<String> {
        self.key_between(current_last, None)
    }

    /// Seed key for an empty scope
    pub fn initial_key(&self) -> String {
        self.to_key(&midpoint(&[], None, self.base()))
    }

    /// `count` strictly ascending keys for seeding a brand-new collection.
    ///
    /// Each key is the `last_key` of the one before it.
    ///
    /// # Arguments
    /// * `count` - Number of keys to generate
    ///
    /// # Returns
    /// `count` keys in ascending order (empty when `count` is 0)
    pub fn initial_key_batch(&self, count: usize) -> Vec<String> {
        let mut keys = Vec::with_capacity(count);
        let mut prev: Vec<u8> = Vec::new();
        for _ in 0..count {
            let next = midpoint(&prev, None, self.base());
            keys.push(self.to_key(&next));
            prev = next;
        }
        keys
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::base62()
    }
}

impl fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Alphabet").field(&self.symbols).finish()
    }
}

/// Digit-wise midpoint of two digit strings.
///
/// `lower` is padded on the right with digit 0; a missing `upper` behaves like
/// the digit `base` at every position. Requires `lower < upper` when `upper` is
/// present and that neither ends with digit 0.
fn midpoint(lower: &[u8], upper: Option<&[u8]>, base: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut upper = upper;
    let mut pos = 0;

    loop {
        let lo = lower.get(pos).copied().unwrap_or(0) as usize;
        let hi = match upper {
            Some(u) => {
                debug_assert!(pos < u.len(), "lower bound is not below upper bound");
                u.get(pos).copied().unwrap_or(0) as usize
            }
            None => base,
        };

        if lo == hi {
            // shared prefix
            out.push(lo as u8);
        } else if hi - lo > 1 {
            out.push(((lo + hi) / 2) as u8);
            return out;
        } else {
            // Adjacent digits: take the lower one. Everything after it is now
            // below `upper`, so only `lower` constrains the remaining positions.
            out.push(lo as u8);
            upper = None;
        }
        pos += 1;
    }
}

/// Generate a key between two optional keys in the default alphabet
pub fn key_between(lower: Option<&str>, upper: Option<&str>) -> Result<String> {
    Alphabet::base62().key_between(lower, upper)
}

pub fn first_key(current_first: Option<&str>) -> Result<String> {
    Alphabet::base62().first_key(current_first)
}

pub fn last_key(current_last: Option<&str>) -> Result<String> {
    Alphabet::base62().last_key(current_last)
}

pub fn initial_key() -> String {
    Alphabet::base62().initial_key()
}

pub fn initial_key_batch(count: usize) -> Vec<String> {
    Alphabet::base62().initial_key_batch(count)
}

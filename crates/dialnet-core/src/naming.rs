//! # Naming Authority
//!
//! Unique-identifier allocation for one namespace.
//!
//! A [`NamingAuthority`] hands out names that are unique among the names it
//! currently holds. Candidates pass through an injected [`TextNormalizer`]
//! first; collisions are resolved by appending a monotonically increasing
//! counter that never resets.

use crate::primitives::{COUNTER_START, MAX_NAME_LENGTH};
use crate::DialnetError;
use std::collections::BTreeSet;
use std::fmt::Debug;

// =============================================================================
// TEXT NORMALIZER
// =============================================================================

/// Restricts arbitrary text to the identifier alphabet of a namespace.
pub trait TextNormalizer: Debug + Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Default normalizer producing script-safe identifiers.
///
/// - ASCII letters, digits and `_` are kept
/// - whitespace and `-` become `_`
/// - everything else is dropped
/// - leading digits are stripped, so identifiers start with a letter or `_`
/// - the result is truncated to `max_length` characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierNormalizer {
    pub lowercase: bool,
    pub max_length: usize,
}

impl Default for IdentifierNormalizer {
    fn default() -> Self {
        Self {
            lowercase: false,
            max_length: MAX_NAME_LENGTH,
        }
    }
}

impl TextNormalizer for IdentifierNormalizer {
    fn normalize(&self, text: &str) -> String {
        let mapped = text.trim().chars().filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                Some(if self.lowercase {
                    c.to_ascii_lowercase()
                } else {
                    c
                })
            } else if c.is_whitespace() || c == '-' {
                Some('_')
            } else {
                None
            }
        });

        mapped
            .skip_while(char::is_ascii_digit)
            .take(self.max_length)
            .collect()
    }
}

// =============================================================================
// NAMING AUTHORITY
// =============================================================================

/// Allocator and validator of unique names within one namespace.
#[derive(Debug)]
pub struct NamingAuthority {
    normalizer: Box<dyn TextNormalizer>,
    reserved: BTreeSet<String>,
    counter: u64,
}

impl Default for NamingAuthority {
    fn default() -> Self {
        Self::new(Box::new(IdentifierNormalizer::default()))
    }
}

impl NamingAuthority {
    /// Create an authority using the given normalizer.
    #[must_use]
    pub fn new(normalizer: Box<dyn TextNormalizer>) -> Self {
        Self {
            normalizer,
            reserved: BTreeSet::new(),
            counter: COUNTER_START,
        }
    }

    /// Reserve and return a fresh numeric token.
    pub fn generate(&mut self) -> String {
        self.use_name("")
    }

    /// Reserve and return a name derived from `candidate`.
    ///
    /// An empty normalized form yields the next free counter token; a free
    /// normalized form is returned verbatim; otherwise the counter is
    /// appended, incrementing on every attempt, until the result is free.
    pub fn use_name(&mut self, candidate: &str) -> String {
        let base = self.normalizer.normalize(candidate);

        let name = if !base.is_empty() && !self.reserved.contains(&base) {
            base
        } else {
            loop {
                let attempt = format!("{}{}", base, self.counter);
                self.counter = self.counter.saturating_add(1);
                if !self.reserved.contains(&attempt) {
                    break attempt;
                }
            }
        };

        tracing::trace!(candidate, name = %name, "name reserved");
        self.reserved.insert(name.clone());
        name
    }

    /// Whether `candidate` is already normalized and currently free.
    #[must_use]
    pub fn is_usable(&self, candidate: &str) -> bool {
        !candidate.is_empty()
            && self.normalizer.normalize(candidate) == candidate
            && !self.reserved.contains(candidate)
    }

    /// Reserve every name in `names`, or none of them.
    pub fn try_use(&mut self, names: &[&str]) -> Result<(), DialnetError> {
        let mut batch = BTreeSet::new();
        for name in names {
            if !self.is_usable(name) || !batch.insert(*name) {
                return Err(DialnetError::NameNotUsable((*name).to_string()));
            }
        }
        self.reserved
            .extend(batch.into_iter().map(str::to_string));
        Ok(())
    }

    /// Free a reserved name.
    pub fn release(&mut self, name: &str) -> Result<(), DialnetError> {
        if self.reserved.remove(name) {
            Ok(())
        } else {
            Err(DialnetError::NotReserved(name.to_string()))
        }
    }

    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Currently reserved names in lexical order.
    pub fn reserved(&self) -> impl Iterator<Item = &str> {
        self.reserved.iter().map(String::as_str)
    }

    /// Current value of the collision counter.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Apply the namespace normalizer without reserving anything.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================

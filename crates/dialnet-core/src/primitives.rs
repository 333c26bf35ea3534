//! # Model Primitives
//!
//! Hardcoded constants of the dialnet editing model.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// First value of a naming authority's collision counter.
///
/// - `use("n")` twice yields `"n"` then `"n1"`.
/// - The counter only grows; released names are not recycled automatically.
pub const COUNTER_START: u64 = 1;

/// Maximum length of a normalized identifier.
///
/// The default normalizer truncates longer candidates. Collision suffixes may
/// extend a name past this length.
pub const MAX_NAME_LENGTH: usize = 64;

/// Priority given to arcs created without an explicit one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Maximum number of commands accepted in a single edit script.
///
/// Scripts longer than this are rejected before any command is applied.
pub const MAX_SCRIPT_COMMANDS: usize = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_one() {
        assert_eq!(COUNTER_START, 1);
    }

    #[test]
    fn default_priority_is_neutral() {
        assert_eq!(DEFAULT_PRIORITY, 0);
    }
}

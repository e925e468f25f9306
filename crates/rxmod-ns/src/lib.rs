#![forbid(unsafe_code)]

//! Hierarchical namespace allocation for reactive module scopes.
//!
//! A *scope* is a namespaced region of identifiers, analogous to a module
//! instance. This crate provides the two vocabulary types the rest of the
//! workspace builds on:
//!
//! - [`ScopePath`]: an immutable path of scope identifiers, root outward.
//! - [`FullName`]: a scope path plus a local name, rendered as a single
//!   string by joining every segment with the reserved separator `-`.
//!
//! # Invariants
//!
//! 1. **No collisions across scopes**: two names with different scope paths
//!    and equal local names never render to the same string, because every
//!    segment is validated to exclude the separator.
//!
//! 2. **Round-trip fidelity**: `FullName::parse(name.to_string())` yields a
//!    value equal to `name`. The last separator-delimited component is the
//!    local name; everything before it is the scope path.
//!
//! 3. **Immutability**: a `ScopePath` never changes after construction;
//!    [`ScopePath::child`] returns a new path.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Empty segment | `""` passed as id or local name | [`NameError::Empty`] |
//! | Reserved separator | `-` inside a segment | [`NameError::ReservedSeparator`] |
//! | Unparsable string | empty component while parsing | [`NameError::Empty`] |

pub mod name;
pub mod path;

pub use name::{FullName, qualify};
pub use path::ScopePath;

/// Reserved separator joining the segments of a rendered [`FullName`].
///
/// Not permitted inside scope identifiers or local names.
pub const SEPARATOR: char = '-';

/// Errors from segment validation and name parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// A scope identifier or local name was empty.
    Empty,
    /// A scope identifier or local name contained the reserved separator.
    ReservedSeparator(String),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "name segment is empty"),
            Self::ReservedSeparator(s) => {
                write!(f, "name segment '{s}' contains reserved separator '{SEPARATOR}'")
            }
        }
    }
}

impl std::error::Error for NameError {}

/// Validate a single segment: non-empty and free of the separator.
pub(crate) fn check_segment(segment: &str) -> Result<(), NameError> {
    if segment.is_empty() {
        return Err(NameError::Empty);
    }
    if segment.contains(SEPARATOR) {
        return Err(NameError::ReservedSeparator(segment.to_owned()));
    }
    Ok(())
}

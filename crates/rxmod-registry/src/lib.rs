#![forbid(unsafe_code)]

//! Scoped binding registry: namespaced inputs and outputs wired to
//! reactive cells.
//!
//! A [`Registry`] is an explicit object (never a process-wide singleton)
//! owning a binding table and a [`Graph`](rxmod_reactive::Graph). Code
//! running inside a [`Scope`] declares inputs, derived values, and render
//! outputs under its own namespace and can only resolve names it declared
//! there — sibling scopes are black boxes to each other.
//!
//! Declarations return **typed handles** ([`InputHandle`],
//! [`DerivedHandle`]); after declaration no stringly-typed lookup is
//! needed. `resolve_*` exists for the duck-typed lookup case and is
//! restricted to the caller's own scope path.
//!
//! # Invariants
//!
//! 1. Only the owning scope mutates its slice of the binding table, at
//!    initialization and teardown.
//! 2. Sibling scope identifiers are unique among live scopes.
//! 3. Declaring a duplicate fully-qualified name overwrites silently
//!    (permitted but discouraged; logged at `warn`, last-write-wins).
//! 4. Dropping a [`Scope`] removes every entry under its path, including
//!    descendant scopes' entries, and releases their cells.
//! 5. [`Registry::flush`] renders atomically: output callbacks run only
//!    after every output evaluated successfully, so a failed pass leaves
//!    prior rendered state unchanged.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown name | Resolve outside own scope, or torn down | [`RegistryError::NotFound`] |
//! | Duplicate sibling id | Live scope with the same path | [`RegistryError::ScopeExists`] |
//! | Wrong type argument | Resolve with mismatched `T` | [`RegistryError::TypeMismatch`] |
//! | Malformed name | Empty or separator-bearing segment | [`RegistryError::Name`] |
//! | Cycle / dropped cell | Reactive failure during flush | [`RegistryError::Reactive`] |

pub mod output;
pub mod registry;
pub mod scope;

pub use registry::{FlushReport, Registry};
pub use scope::{DerivedHandle, InputHandle, Scope};

use rxmod_ns::NameError;
use rxmod_reactive::ReactiveError;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is not declared under the caller's scope.
    NotFound {
        /// The fully-qualified name that failed to resolve.
        name: String,
    },
    /// A live sibling scope already uses this identifier.
    ScopeExists {
        /// The colliding scope path.
        path: String,
    },
    /// The binding exists but holds a different value type or kind.
    TypeMismatch {
        /// The fully-qualified name of the binding.
        name: String,
    },
    /// A scope identifier or local name failed validation.
    Name(NameError),
    /// A reactive cell operation failed.
    Reactive(ReactiveError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "no binding named '{name}' in this scope"),
            Self::ScopeExists { path } => {
                write!(f, "a live scope already exists at '{path}'")
            }
            Self::TypeMismatch { name } => {
                write!(f, "binding '{name}' holds a different type or kind")
            }
            Self::Name(err) => write!(f, "invalid name: {err}"),
            Self::Reactive(err) => write!(f, "reactive failure: {err}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Name(err) => Some(err),
            Self::Reactive(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NameError> for RegistryError {
    fn from(err: NameError) -> Self {
        Self::Name(err)
    }
}

impl From<ReactiveError> for RegistryError {
    fn from(err: ReactiveError) -> Self {
        Self::Reactive(err)
    }
}

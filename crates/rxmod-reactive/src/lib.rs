#![forbid(unsafe_code)]

//! Dependency-tracked memoized value cells with explicit invalidation.
//!
//! This crate provides the reactive core for scoped UI modules:
//!
//! - [`Graph`]: an explicit, single-threaded cell graph. Never a global;
//!   callers hold a cheaply clonable handle and pass it where needed.
//! - [`Source`]: an externally-set input cell.
//! - [`Computed`]: a memoized thunk whose dependencies are recorded on
//!   every read it performs, and which recomputes lazily when dirty.
//!
//! # Architecture
//!
//! The graph uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Cells live in an arena indexed by [`CellId`]; ids are allocated in
//! declaration order and never reused, which doubles as the recomputation
//! tie-break between otherwise unordered cells.
//!
//! Each cell is `Clean`, `Dirty`, or `Computing`. Invalidation marks
//! exactly the transitive dependents dirty; recomputation is pull-based,
//! so a dependent's thunk cleans its dependencies before producing a
//! value. Reading a cell that is already `Computing` is a reentrant or
//! circular dependency and fails with [`ReactiveError::Cycle`].
//!
//! # Invariants
//!
//! 1. `Computed::get()` never returns a stale value.
//! 2. Reading twice without an intervening invalidation does not rerun the
//!    thunk.
//! 3. `Source::set()` with a value equal to the current one is a no-op.
//! 4. Dependents recompute only after all of their direct dependencies are
//!    clean.
//! 5. Invalidations raised while a [`Graph::stabilize`] pass is running
//!    are deferred until the pass completes, then trigger a follow-up
//!    pass; those raised during a lazy read apply as soon as the
//!    outermost read finishes. Values are still updated immediately.
//! 6. A failed read or pass leaves every untouched cell's memoized value
//!    as it was.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Reentrant read | Cell read while `Computing` | [`ReactiveError::Cycle`] |
//! | Released cell | Owning scope torn down | [`ReactiveError::Dropped`] |
//! | Divergent feedback | Passes never quiesce | [`ReactiveError::Unsettled`] |

pub mod graph;
pub mod handle;

pub use graph::{CellId, Graph, PassReport};
pub use handle::{Computed, Source};

/// Errors from reactive cell operations.
///
/// All are surfaced immediately to the caller that triggered the offending
/// operation; none are silently recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A cell was read while already recomputing (reentrant or circular
    /// dependency).
    Cycle {
        /// Description of the offending cell.
        cell: String,
    },
    /// A cell was used after its owning scope released it.
    Dropped {
        /// Description of the offending cell.
        cell: String,
    },
    /// Deferred invalidations kept arriving and the graph never quiesced.
    Unsettled {
        /// Number of passes attempted before giving up.
        passes: usize,
    },
}

impl std::fmt::Display for ReactiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { cell } => {
                write!(f, "dependency cycle detected while computing {cell}")
            }
            Self::Dropped { cell } => {
                write!(f, "{cell} was released with its owning scope")
            }
            Self::Unsettled { passes } => {
                write!(f, "graph failed to settle after {passes} passes")
            }
        }
    }
}

impl std::error::Error for ReactiveError {}

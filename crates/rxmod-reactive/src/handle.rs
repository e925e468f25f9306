#![forbid(unsafe_code)]

//! Typed handles over graph cells.
//!
//! Handles are cheap to clone and share the graph interior. A handle
//! outliving its cell (the owning scope was torn down) is not unsound;
//! every operation on it reports [`ReactiveError::Dropped`].

use std::marker::PhantomData;
use std::rc::Rc;

use crate::ReactiveError;
use crate::graph::{CellId, Graph};

/// Typed handle to an externally-set input cell.
///
/// Created with [`Graph::source`]. Setting a value equal to the current
/// one is a no-op: no version bump, no invalidation.
pub struct Source<T> {
    pub(crate) graph: Graph,
    pub(crate) id: CellId,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("cell", &self.graph.describe(self.id))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Source<T> {
    /// Read the current value.
    ///
    /// Inside another cell's recomputation this records a dependency edge.
    pub fn get(&self) -> Result<T, ReactiveError> {
        let value = self.graph.read_any(self.id)?;
        Ok(downcast::<T>(&value))
    }

    /// Replace the value and mark exactly the transitive dependents dirty.
    ///
    /// Equal values are a no-op. During an evaluation pass or another
    /// cell's recomputation the value is stored immediately but the
    /// invalidation is deferred: until the end of the pass (triggering a
    /// follow-up pass), or until the outermost read finishes.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        let unchanged = self
            .graph
            .peek_any(self.id)?
            .as_ref()
            .and_then(|current| current.downcast_ref::<T>())
            .is_some_and(|current| *current == value);
        if unchanged {
            return Ok(());
        }
        self.graph.store(self.id, Rc::new(value))?;
        self.graph.invalidate(self.id, false)
    }

    /// Apply `f` to the current value and set the result.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), ReactiveError> {
        let current = self.get()?;
        self.set(f(&current))
    }

    /// The underlying cell id.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.id
    }

    /// The graph this cell belongs to.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// Typed handle to a memoized computed cell.
///
/// Created with [`Graph::computed`]. Reads pull: a dirty cell recomputes
/// (cleaning its dependencies first), a clean cell returns the memoized
/// value without rerunning the thunk.
pub struct Computed<T> {
    pub(crate) graph: Graph,
    pub(crate) id: CellId,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("cell", &self.graph.describe(self.id))
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Read the memoized value, recomputing first if dirty.
    ///
    /// Fails with [`ReactiveError::Cycle`] when the cell is already
    /// mid-recomputation (reentrant or circular dependency).
    pub fn get(&self) -> Result<T, ReactiveError> {
        let value = self.graph.read_any(self.id)?;
        Ok(downcast::<T>(&value))
    }

    /// Mark this cell and all transitive dependents dirty.
    pub fn invalidate(&self) -> Result<(), ReactiveError> {
        self.graph.invalidate(self.id, true)
    }

    /// The underlying cell id.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.id
    }

    /// The graph this cell belongs to.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

fn downcast<T: Clone + 'static>(value: &Rc<dyn std::any::Any>) -> T {
    value
        .downcast_ref::<T>()
        .expect("cell value diverged from its handle's type")
        .clone()
}

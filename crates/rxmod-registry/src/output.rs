#![forbid(unsafe_code)]

//! Output bindings: computed cells paired with render callbacks.
//!
//! Rendering is two-phase so a flush is atomic: every changed output is
//! evaluated into a staged value first, and callbacks run only once all
//! evaluations succeeded. An error between the phases discards the staged
//! values and leaves prior rendered state unchanged.

use rxmod_reactive::{Computed, ReactiveError};

/// Type-erased render target held by the registry.
pub(crate) trait OutputBinding {
    /// Evaluate the output's cell. Returns whether the value changed since
    /// the last committed render; a changed value is held staged.
    fn stage(&mut self) -> Result<bool, ReactiveError>;

    /// Invoke the render callback with the staged value, if any.
    fn commit(&mut self);

    /// Discard the staged value without rendering.
    fn abort(&mut self);
}

/// A typed output: memoized cell plus its render callback.
pub(crate) struct OutputSlot<T> {
    cell: Computed<T>,
    render: Box<dyn FnMut(&T)>,
    last_version: Option<u64>,
    staged: Option<(T, u64)>,
}

impl<T: Clone + 'static> OutputSlot<T> {
    pub(crate) fn new(cell: Computed<T>, render: Box<dyn FnMut(&T)>) -> Self {
        Self {
            cell,
            render,
            last_version: None,
            staged: None,
        }
    }
}

impl<T: Clone + 'static> OutputBinding for OutputSlot<T> {
    fn stage(&mut self) -> Result<bool, ReactiveError> {
        let value = self.cell.get()?;
        let version = self.cell.graph().version(self.cell.id())?;
        if self.last_version == Some(version) {
            return Ok(false);
        }
        self.staged = Some((value, version));
        Ok(true)
    }

    fn commit(&mut self) {
        if let Some((value, version)) = self.staged.take() {
            (self.render)(&value);
            self.last_version = Some(version);
        }
    }

    fn abort(&mut self) {
        self.staged = None;
    }
}

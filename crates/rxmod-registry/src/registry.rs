#![forbid(unsafe_code)]

//! The registry object: binding table, live scopes, and atomic flush.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use rxmod_ns::{FullName, ScopePath};
use rxmod_reactive::{CellId, Graph};
use tracing::{debug, warn};

use crate::RegistryError;
use crate::output::OutputBinding;
use crate::scope::Scope;

/// One binding table row.
pub(crate) struct Entry {
    pub(crate) cell: CellId,
    pub(crate) kind: EntryKind,
}

pub(crate) enum EntryKind {
    /// Boxed `Source<T>` handle.
    Input(Box<dyn Any>),
    /// Boxed `Computed<T>` handle.
    Derived(Box<dyn Any>),
    /// Render target; the binding itself lives in the output list.
    Output,
}

pub(crate) struct OutputEntry {
    pub(crate) name: FullName,
    pub(crate) binding: Box<dyn OutputBinding>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    pub(crate) entries: AHashMap<FullName, Entry>,
    /// Render targets in declaration order (flush order).
    pub(crate) outputs: Vec<OutputEntry>,
    pub(crate) live_scopes: AHashSet<ScopePath>,
}

/// Outcome of a [`Registry::flush`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Evaluation passes run by the underlying graph.
    pub passes: usize,
    /// Cell thunks that reran.
    pub recomputed: usize,
    /// Output callbacks invoked.
    pub rendered: usize,
}

/// An explicit scoped binding registry.
///
/// Owns the binding table and a reactive [`Graph`]. Cloning is cheap and
/// shares the interior; pass the registry by reference into each scope
/// rather than reaching for a global.
///
/// # Example
///
/// ```
/// use rxmod_registry::Registry;
///
/// let registry = Registry::new();
/// let hist = registry.root_scope("hist1")?;
/// let bins = hist.input("bins", 30_u32)?;
///
/// let label = hist.derived("label", {
///     let bins = bins.cell().clone();
///     move || Ok(format!("{} bins", bins.get()?))
/// })?;
/// assert_eq!(label.get()?, "30 bins");
/// # Ok::<(), rxmod_registry::RegistryError>(())
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    pub(crate) graph: Graph,
    pub(crate) inner: Rc<RefCell<RegistryInner>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("bindings", &inner.entries.len())
            .field("outputs", &inner.outputs.len())
            .field("live_scopes", &inner.live_scopes.len())
            .finish()
    }
}

impl Registry {
    /// Create a registry with its own empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry over an existing graph (shared with other
    /// registries or free-standing cells).
    #[must_use]
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            graph,
            inner: Rc::default(),
        }
    }

    /// The underlying reactive graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Open a top-level scope.
    ///
    /// Fails with [`RegistryError::ScopeExists`] when a live scope already
    /// uses `id` at the top level. The returned [`Scope`] tears its
    /// bindings down on drop.
    pub fn root_scope(&self, id: impl Into<String>) -> Result<Scope, RegistryError> {
        self.open_scope(&ScopePath::root(), id)
    }

    pub(crate) fn open_scope(
        &self,
        parent: &ScopePath,
        id: impl Into<String>,
    ) -> Result<Scope, RegistryError> {
        let path = parent.child(id)?;
        let mut inner = self.inner.borrow_mut();
        if !inner.live_scopes.insert(path.clone()) {
            return Err(RegistryError::ScopeExists {
                path: path.to_string(),
            });
        }
        drop(inner);
        Ok(Scope::new(self.clone(), path))
    }

    /// Number of declared bindings across all scopes.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no bindings are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Whether a fully-qualified name is currently bound.
    #[must_use]
    pub fn contains(&self, name: &FullName) -> bool {
        self.inner.borrow().entries.contains_key(name)
    }

    /// Insert an entry, overwriting (and releasing) any previous binding
    /// with the same name. Last-write-wins, logged.
    pub(crate) fn insert_entry(&self, name: FullName, entry: Entry) {
        let mut inner = self.inner.borrow_mut();
        if let Some(old) = inner.entries.insert(name.clone(), entry) {
            warn!(name = %name, "duplicate declaration overwrites existing binding");
            inner.outputs.retain(|output| output.name != name);
            self.graph.release(old.cell);
        }
    }

    /// Remove every binding under `path` and release its cells.
    pub(crate) fn teardown(&self, path: &ScopePath) {
        let mut inner = self.inner.borrow_mut();
        let doomed: Vec<FullName> = inner
            .entries
            .keys()
            .filter(|name| name.is_within(path))
            .cloned()
            .collect();
        for name in &doomed {
            if let Some(entry) = inner.entries.remove(name) {
                self.graph.release(entry.cell);
            }
        }
        inner.outputs.retain(|output| !output.name.is_within(path));
        inner.live_scopes.retain(|scope| !scope.starts_with(path));
        if !doomed.is_empty() {
            debug!(scope = %path, removed = doomed.len(), "scope torn down");
        }
    }

    /// Run a reactive pass and render every changed output.
    ///
    /// Two-phase: all changed outputs are evaluated (staged) first, then
    /// their callbacks run in declaration order. Any error — a cycle, a
    /// torn-down cell — aborts before the first callback, leaving prior
    /// rendered state unchanged.
    pub fn flush(&self) -> Result<FlushReport, RegistryError> {
        let pass = self.graph.stabilize()?;

        // Outputs are taken out of the table so callbacks can re-enter
        // the registry (declare, resolve, tear down) without a conflict.
        let mut outputs = std::mem::take(&mut self.inner.borrow_mut().outputs);

        let mut staged = Vec::new();
        let mut failure = None;
        for (idx, output) in outputs.iter_mut().enumerate() {
            match output.binding.stage() {
                Ok(true) => staged.push(idx),
                Ok(false) => {}
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            for idx in &staged {
                outputs[*idx].binding.abort();
            }
            self.restore_outputs(outputs);
            return Err(err.into());
        }

        let rendered = staged.len();
        for idx in &staged {
            outputs[*idx].binding.commit();
        }
        self.restore_outputs(outputs);

        let report = FlushReport {
            passes: pass.passes,
            recomputed: pass.recomputed,
            rendered,
        };
        debug!(
            passes = report.passes,
            recomputed = report.recomputed,
            rendered = report.rendered,
            "flush complete"
        );
        Ok(report)
    }

    /// Put taken outputs back, dropping any that were torn down or
    /// redeclared by a callback while they were out.
    fn restore_outputs(&self, mut outputs: Vec<OutputEntry>) {
        let mut inner = self.inner.borrow_mut();
        let redeclared: AHashSet<FullName> =
            inner.outputs.iter().map(|o| o.name.clone()).collect();
        outputs.retain(|output| {
            inner.entries.contains_key(&output.name) && !redeclared.contains(&output.name)
        });
        let appended = std::mem::take(&mut inner.outputs);
        outputs.extend(appended);
        inner.outputs = outputs;
    }
}

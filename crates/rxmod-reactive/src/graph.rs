#![forbid(unsafe_code)]

//! The cell graph: arena, state machine, and evaluation passes.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ReactiveError;
use crate::handle::{Computed, Source};

/// Upper bound on follow-up passes triggered by deferred invalidations.
///
/// A graph that keeps invalidating itself past this bound is treated as
/// divergent feedback and reported as [`ReactiveError::Unsettled`].
const MAX_PASSES: usize = 64;

/// Identifier of a cell slot within a [`Graph`].
///
/// Allocated in declaration order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell #{}", self.0)
    }
}

/// Outcome of a [`Graph::stabilize`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Number of passes run (1 unless invalidations were deferred).
    pub passes: usize,
    /// Number of thunks that actually reran.
    pub recomputed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellState {
    Clean,
    Dirty,
    Computing,
}

pub(crate) type AnyValue = Rc<dyn Any>;
type Thunk = Rc<dyn Fn() -> Result<AnyValue, ReactiveError>>;

struct Slot {
    label: Option<String>,
    state: CellState,
    value: Option<AnyValue>,
    /// `None` for sources; sources are only written through `set`.
    thunk: Option<Thunk>,
    /// Upstream cells read during the last recomputation.
    deps: Vec<CellId>,
    /// Downstream cells that read this one during their last recomputation.
    dependents: Vec<CellId>,
    /// Bumped on every stored value (external set or successful compute).
    version: u64,
    alive: bool,
}

#[derive(Default)]
struct GraphInner {
    slots: Vec<Slot>,
    /// Stack of cells currently recomputing; the top is the active reader.
    active: Vec<CellId>,
    in_pass: bool,
    /// Invalidations raised mid-pass: `(origin, include_origin)`.
    deferred: Vec<(CellId, bool)>,
    /// Total successful recomputations, for pass reports and tests.
    computes: u64,
}

impl GraphInner {
    fn describe(&self, id: CellId) -> String {
        match self.slots[id.0 as usize].label.as_deref() {
            Some(label) => label.to_owned(),
            None => id.to_string(),
        }
    }

    fn check_alive(&self, id: CellId) -> Result<(), ReactiveError> {
        if self.slots[id.0 as usize].alive {
            Ok(())
        } else {
            Err(ReactiveError::Dropped {
                cell: self.describe(id),
            })
        }
    }

    /// Record a dependency edge from the active reader (if any) to `id`.
    fn record_edge_to(&mut self, id: CellId) {
        let Some(&reader) = self.active.last() else {
            return;
        };
        if reader == id {
            // Self-read; the Computing state check reports the cycle.
            return;
        }
        let reader_idx = reader.0 as usize;
        if !self.slots[reader_idx].deps.contains(&id) {
            self.slots[reader_idx].deps.push(id);
        }
        let read_idx = id.0 as usize;
        if !self.slots[read_idx].dependents.contains(&reader) {
            self.slots[read_idx].dependents.push(reader);
        }
    }

    /// Drop the upstream edges recorded by `id`'s previous recomputation.
    fn clear_deps(&mut self, id: CellId) {
        let deps = std::mem::take(&mut self.slots[id.0 as usize].deps);
        for dep in deps {
            self.slots[dep.0 as usize].dependents.retain(|d| *d != id);
        }
    }

    /// Mark `origin`'s transitive dependents (and optionally `origin`
    /// itself) dirty. Marks exactly the transitive closure: an
    /// already-dirty cell's dependents were marked when it became dirty,
    /// so the walk stops there.
    fn mark_dirty(&mut self, origin: CellId, include_origin: bool) {
        let mut stack = Vec::new();
        if include_origin {
            stack.push(origin);
        } else {
            stack.extend(self.slots[origin.0 as usize].dependents.iter().copied());
        }
        while let Some(id) = stack.pop() {
            let slot = &mut self.slots[id.0 as usize];
            if !slot.alive || slot.state != CellState::Clean {
                continue;
            }
            if slot.thunk.is_none() {
                // Sources hold externally-set values and never go dirty.
                continue;
            }
            slot.state = CellState::Dirty;
            stack.extend(slot.dependents.iter().copied());
        }
    }
}

/// An explicit, single-threaded reactive cell graph.
///
/// Cloning is cheap (shared interior); equality of clones is identity of
/// the underlying graph. Construct cells with [`Graph::source`] and
/// [`Graph::computed`], then drive recomputation either lazily through
/// handle reads or eagerly through [`Graph::stabilize`].
///
/// # Example
///
/// ```
/// use rxmod_reactive::Graph;
///
/// let graph = Graph::new();
/// let bins = graph.source(10_u32);
/// let label = {
///     let bins = bins.clone();
///     graph.computed(move || Ok(format!("{} bins", bins.get()?)))
/// };
///
/// assert_eq!(label.get()?, "10 bins");
/// bins.set(25)?;
/// assert_eq!(label.get()?, "25 bins");
/// # Ok::<(), rxmod_reactive::ReactiveError>(())
/// ```
#[derive(Clone, Default)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Graph")
            .field("cells", &inner.slots.len())
            .field("in_pass", &inner.in_pass)
            .finish()
    }
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, slot: Slot) -> CellId {
        let mut inner = self.inner.borrow_mut();
        let id = CellId(u32::try_from(inner.slots.len()).expect("cell arena exceeded u32 slots"));
        inner.slots.push(slot);
        id
    }

    /// Create an input cell holding `value`.
    pub fn source<T: Clone + PartialEq + 'static>(&self, value: T) -> Source<T> {
        self.source_inner(None, value)
    }

    /// Create an input cell with a diagnostic label (used in error and
    /// trace output).
    pub fn labeled_source<T: Clone + PartialEq + 'static>(
        &self,
        label: impl Into<String>,
        value: T,
    ) -> Source<T> {
        self.source_inner(Some(label.into()), value)
    }

    fn source_inner<T: Clone + PartialEq + 'static>(
        &self,
        label: Option<String>,
        value: T,
    ) -> Source<T> {
        let id = self.alloc(Slot {
            label,
            state: CellState::Clean,
            value: Some(Rc::new(value)),
            thunk: None,
            deps: Vec::new(),
            dependents: Vec::new(),
            version: 1,
            alive: true,
        });
        Source {
            graph: self.clone(),
            id,
            _marker: PhantomData,
        }
    }

    /// Create a memoized cell computed by `thunk`.
    ///
    /// Reads the thunk performs through [`Source::get`] or
    /// [`Computed::get`] record dependency edges; edges are re-recorded on
    /// every recomputation, so conditional reads track the live set.
    pub fn computed<T, F>(&self, thunk: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        self.computed_inner(None, thunk)
    }

    /// Create a memoized cell with a diagnostic label.
    pub fn labeled_computed<T, F>(&self, label: impl Into<String>, thunk: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        self.computed_inner(Some(label.into()), thunk)
    }

    fn computed_inner<T, F>(&self, label: Option<String>, thunk: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        let erased: Thunk = Rc::new(move || thunk().map(|value| Rc::new(value) as AnyValue));
        let id = self.alloc(Slot {
            label,
            state: CellState::Dirty,
            value: None,
            thunk: Some(erased),
            deps: Vec::new(),
            dependents: Vec::new(),
            version: 0,
            alive: true,
        });
        Computed {
            graph: self.clone(),
            id,
            _marker: PhantomData,
        }
    }

    /// Read a cell's value, recomputing first when dirty.
    ///
    /// Records a dependency edge when called from inside another cell's
    /// recomputation. Fails with [`ReactiveError::Cycle`] if the cell is
    /// already mid-recomputation.
    pub(crate) fn read_any(&self, id: CellId) -> Result<AnyValue, ReactiveError> {
        let thunk = {
            let mut inner = self.inner.borrow_mut();
            inner.check_alive(id)?;
            inner.record_edge_to(id);

            let idx = id.0 as usize;
            match inner.slots[idx].state {
                CellState::Computing => {
                    let cell = inner.describe(id);
                    return Err(ReactiveError::Cycle { cell });
                }
                CellState::Clean => {
                    if let Some(value) = inner.slots[idx].value.as_ref() {
                        return Ok(Rc::clone(value));
                    }
                }
                CellState::Dirty => {}
            }

            let Some(thunk) = inner.slots[idx].thunk.clone() else {
                // A source is never marked dirty; return its stored value.
                let value = inner.slots[idx]
                    .value
                    .as_ref()
                    .map(Rc::clone)
                    .ok_or_else(|| ReactiveError::Dropped {
                        cell: inner.describe(id),
                    })?;
                inner.slots[idx].state = CellState::Clean;
                return Ok(value);
            };

            // Old edges are dropped so conditional reads re-track.
            inner.clear_deps(id);
            inner.slots[idx].state = CellState::Computing;
            inner.active.push(id);
            thunk
        };

        // Thunk runs with the graph unborrowed; its own reads re-enter.
        let result = thunk();

        let mut inner = self.inner.borrow_mut();
        let popped = inner.active.pop();
        debug_assert_eq!(popped, Some(id));
        let idx = id.0 as usize;
        let outcome = match result {
            Ok(value) => {
                let slot = &mut inner.slots[idx];
                slot.value = Some(Rc::clone(&value));
                slot.state = CellState::Clean;
                slot.version += 1;
                inner.computes += 1;
                trace!(cell = %inner.describe(id), "recomputed");
                Ok(value)
            }
            Err(err) => {
                inner.slots[idx].state = CellState::Dirty;
                Err(err)
            }
        };

        // Outside a pass, invalidations deferred during this recomputation
        // have no follow-up pass to drain them; apply them now so lazy
        // reads on dependents see the write-back.
        if inner.active.is_empty() && !inner.in_pass {
            let deferred = std::mem::take(&mut inner.deferred);
            for (origin, include_origin) in deferred {
                if inner.slots[origin.0 as usize].alive {
                    inner.mark_dirty(origin, include_origin);
                }
            }
        }
        outcome
    }

    /// Store a new value into a source slot, bumping its version.
    pub(crate) fn store(&self, id: CellId, value: AnyValue) -> Result<(), ReactiveError> {
        let mut inner = self.inner.borrow_mut();
        inner.check_alive(id)?;
        let slot = &mut inner.slots[id.0 as usize];
        slot.value = Some(value);
        slot.version += 1;
        Ok(())
    }

    /// Current stored value of a cell, without recomputation or edge
    /// recording. `None` for a never-computed cell.
    pub(crate) fn peek_any(&self, id: CellId) -> Result<Option<AnyValue>, ReactiveError> {
        let inner = self.inner.borrow();
        inner.check_alive(id)?;
        Ok(inner.slots[id.0 as usize].value.as_ref().map(Rc::clone))
    }

    /// Mark `origin`'s transitive dependents (and `origin` itself when it
    /// is a computed cell and `include_origin` is set) dirty.
    ///
    /// Inside a pass the invalidation is deferred until the pass completes,
    /// then triggers a follow-up pass. Inside a lazy recomputation it is
    /// applied as soon as the outermost read finishes. The origin's value
    /// update (if any) is never deferred.
    pub(crate) fn invalidate(&self, origin: CellId, include_origin: bool) -> Result<(), ReactiveError> {
        let mut inner = self.inner.borrow_mut();
        inner.check_alive(origin)?;
        if inner.in_pass || !inner.active.is_empty() {
            trace!(cell = %inner.describe(origin), "invalidation deferred to next pass");
            inner.deferred.push((origin, include_origin));
        } else {
            inner.mark_dirty(origin, include_origin);
        }
        Ok(())
    }

    /// Run one evaluation pass: recompute every dirty cell, dependencies
    /// before dependents, ties broken by declaration order.
    ///
    /// Invalidations deferred during the pass trigger follow-up passes,
    /// bounded by an internal limit; exceeding it fails with
    /// [`ReactiveError::Unsettled`]. Any error aborts the pass and leaves
    /// untouched cells' memoized values as they were.
    pub fn stabilize(&self) -> Result<PassReport, ReactiveError> {
        let computes_before = {
            let mut inner = self.inner.borrow_mut();
            if inner.in_pass {
                return Err(ReactiveError::Cycle {
                    cell: "stabilize".to_owned(),
                });
            }
            inner.in_pass = true;
            inner.computes
        };

        let mut passes = 0_usize;
        loop {
            passes += 1;
            if passes > MAX_PASSES {
                self.inner.borrow_mut().in_pass = false;
                return Err(ReactiveError::Unsettled { passes: passes - 1 });
            }

            // Dirty cells in declaration order; pull-based reads clean
            // dependencies first, so this is a valid topological order.
            let dirty: Vec<CellId> = {
                let inner = self.inner.borrow();
                inner
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.alive && slot.state == CellState::Dirty)
                    .map(|(idx, _)| CellId(idx as u32))
                    .collect()
            };
            for id in dirty {
                let still_dirty = {
                    let inner = self.inner.borrow();
                    inner.slots[id.0 as usize].state == CellState::Dirty
                };
                if !still_dirty {
                    continue;
                }
                if let Err(err) = self.read_any(id) {
                    self.inner.borrow_mut().in_pass = false;
                    return Err(err);
                }
            }

            let deferred = {
                let mut inner = self.inner.borrow_mut();
                std::mem::take(&mut inner.deferred)
            };
            if deferred.is_empty() {
                break;
            }
            let mut inner = self.inner.borrow_mut();
            for (origin, include_origin) in deferred {
                if inner.slots[origin.0 as usize].alive {
                    inner.mark_dirty(origin, include_origin);
                }
            }
            trace!(pass = passes, "deferred invalidations; running follow-up pass");
        }

        let mut inner = self.inner.borrow_mut();
        inner.in_pass = false;
        let report = PassReport {
            passes,
            recomputed: usize::try_from(inner.computes - computes_before).unwrap_or(usize::MAX),
        };
        debug!(passes = report.passes, recomputed = report.recomputed, "graph stabilized");
        Ok(report)
    }

    /// Release a cell slot when its owning scope is torn down.
    ///
    /// Edges to and from the slot are removed; later use of a handle to it
    /// fails with [`ReactiveError::Dropped`]. Releasing an already-released
    /// cell is a no-op.
    pub fn release(&self, id: CellId) {
        let mut inner = self.inner.borrow_mut();
        let idx = id.0 as usize;
        if idx >= inner.slots.len() || !inner.slots[idx].alive {
            return;
        }
        inner.clear_deps(id);
        let dependents = std::mem::take(&mut inner.slots[idx].dependents);
        for dependent in dependents {
            inner.slots[dependent.0 as usize].deps.retain(|d| *d != id);
        }
        let slot = &mut inner.slots[idx];
        slot.alive = false;
        slot.value = None;
        slot.thunk = None;
        slot.state = CellState::Clean;
    }

    /// Whether a cell slot is still live.
    #[must_use]
    pub fn is_alive(&self, id: CellId) -> bool {
        let inner = self.inner.borrow();
        let idx = id.0 as usize;
        idx < inner.slots.len() && inner.slots[idx].alive
    }

    /// Version counter of a cell, bumped on every stored value.
    pub fn version(&self, id: CellId) -> Result<u64, ReactiveError> {
        let inner = self.inner.borrow();
        inner.check_alive(id)?;
        Ok(inner.slots[id.0 as usize].version)
    }

    /// Total number of slots ever allocated (including released ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Whether no cells were ever allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    /// Number of live cells currently marked dirty.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.alive && slot.state == CellState::Dirty)
            .count()
    }

    /// Total successful recomputations since the graph was created.
    ///
    /// Useful in tests asserting memoization (no recomputation between
    /// reads without invalidation).
    #[must_use]
    pub fn compute_count(&self) -> u64 {
        self.inner.borrow().computes
    }

    /// Diagnostic description of a cell: its label or `cell #N`.
    #[must_use]
    pub fn describe(&self, id: CellId) -> String {
        self.inner.borrow().describe(id)
    }
}

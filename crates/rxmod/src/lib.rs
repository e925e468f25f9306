#![forbid(unsafe_code)]

//! Scoped reactive modules: public facade and prelude.
//!
//! `rxmod` implements the "module" mechanism of reactive UI frameworks as
//! three composable pieces:
//!
//! - [`ns`]: hierarchical namespace allocation — scope paths and
//!   collision-free fully-qualified names.
//! - [`reactive`]: dependency-tracked memoized value cells with explicit
//!   invalidation and topologically ordered recomputation passes.
//! - [`registry`]: a scoped binding registry wiring namespaced inputs and
//!   render outputs to cells, with enforced black-box isolation between
//!   sibling scopes and atomic output flushes.
//!
//! # Quick start
//!
//! ```
//! use rxmod::prelude::*;
//!
//! let registry = Registry::new();
//! let hist = registry.root_scope("hist1")?;
//!
//! let bins = hist.input("bins", 30_u32)?;
//! hist.output(
//!     "plot",
//!     {
//!         let bins = bins.cell().clone();
//!         move || Ok(format!("histogram with {} bins", bins.get()?))
//!     },
//!     |text: &String| println!("{text}"),
//! )?;
//!
//! registry.flush()?;
//! bins.set(40)?;
//! registry.flush()?;
//! # Ok::<(), rxmod::RegistryError>(())
//! ```

pub use rxmod_ns as ns;
pub use rxmod_reactive as reactive;
pub use rxmod_registry as registry;

pub use rxmod_ns::{FullName, NameError, ScopePath, qualify};
pub use rxmod_reactive::{CellId, Computed, Graph, PassReport, ReactiveError, Source};
pub use rxmod_registry::{
    DerivedHandle, FlushReport, InputHandle, Registry, RegistryError, Scope,
};

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{
        Computed, DerivedHandle, FullName, Graph, InputHandle, Registry, Scope, ScopePath, Source,
        qualify,
    };
}

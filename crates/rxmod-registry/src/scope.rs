#![forbid(unsafe_code)]

//! Scopes: namespaced declaration and resolution of bindings.

use std::fmt;

use rxmod_ns::{FullName, ScopePath, qualify};
use rxmod_reactive::{Computed, ReactiveError, Source};

use crate::RegistryError;
use crate::output::OutputSlot;
use crate::registry::{Entry, EntryKind, OutputEntry, Registry};

/// A live namespaced region of bindings.
///
/// Created with [`Registry::root_scope`] or [`Scope::child`]. Every name
/// declared through a scope is qualified under its path, and resolution
/// is restricted to that path — a scope cannot address a sibling's
/// bindings. Dropping the scope tears down everything it (and any
/// descendant scope) declared.
pub struct Scope {
    registry: Registry,
    path: ScopePath,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("path", &self.path).finish()
    }
}

impl Scope {
    pub(crate) fn new(registry: Registry, path: ScopePath) -> Self {
        Self { registry, path }
    }

    /// This scope's path.
    #[must_use]
    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    /// The registry this scope belongs to.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Open a nested scope. Sibling ids must be unique among live scopes.
    pub fn child(&self, id: impl Into<String>) -> Result<Self, RegistryError> {
        self.registry.open_scope(&self.path, id)
    }

    /// Qualify `local` under this scope's path.
    pub fn qualify(&self, local: &str) -> Result<FullName, RegistryError> {
        Ok(qualify(&self.path, local)?)
    }

    /// Declare an input binding holding `initial`.
    ///
    /// Returns a typed handle; redeclaring the same name overwrites the
    /// previous binding (logged, discouraged).
    pub fn input<T: Clone + PartialEq + 'static>(
        &self,
        local: &str,
        initial: T,
    ) -> Result<InputHandle<T>, RegistryError> {
        let name = self.qualify(local)?;
        let source = self
            .registry
            .graph
            .labeled_source(name.to_string(), initial);
        self.registry.insert_entry(
            name.clone(),
            Entry {
                cell: source.id(),
                kind: EntryKind::Input(Box::new(source.clone())),
            },
        );
        Ok(InputHandle { name, source })
    }

    /// Declare a derived binding computed by `thunk`.
    pub fn derived<T, F>(&self, local: &str, thunk: F) -> Result<DerivedHandle<T>, RegistryError>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        let name = self.qualify(local)?;
        let cell = self
            .registry
            .graph
            .labeled_computed(name.to_string(), thunk);
        self.registry.insert_entry(
            name.clone(),
            Entry {
                cell: cell.id(),
                kind: EntryKind::Derived(Box::new(cell.clone())),
            },
        );
        Ok(DerivedHandle { name, cell })
    }

    /// Declare a render output: a computed value plus the callback that
    /// presents it. The callback runs during [`Registry::flush`], only
    /// when the value changed and only after the whole flush evaluated
    /// successfully.
    pub fn output<T, F, R>(&self, local: &str, thunk: F, render: R) -> Result<(), RegistryError>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, ReactiveError> + 'static,
        R: FnMut(&T) + 'static,
    {
        let name = self.qualify(local)?;
        let cell = self
            .registry
            .graph
            .labeled_computed(name.to_string(), thunk);
        self.registry.insert_entry(
            name.clone(),
            Entry {
                cell: cell.id(),
                kind: EntryKind::Output,
            },
        );
        self.registry.inner.borrow_mut().outputs.push(OutputEntry {
            name,
            binding: Box::new(OutputSlot::new(cell, Box::new(render))),
        });
        Ok(())
    }

    /// Resolve an input declared under this scope.
    ///
    /// Names outside the scope's own path are not addressable here; an
    /// undeclared or torn-down name fails with
    /// [`RegistryError::NotFound`], a wrong `T` with
    /// [`RegistryError::TypeMismatch`].
    pub fn resolve_input<T: Clone + PartialEq + 'static>(
        &self,
        local: &str,
    ) -> Result<InputHandle<T>, RegistryError> {
        let name = self.qualify(local)?;
        let inner = self.registry.inner.borrow();
        let entry = inner.entries.get(&name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
        match &entry.kind {
            EntryKind::Input(any) => any
                .downcast_ref::<Source<T>>()
                .cloned()
                .map(|source| InputHandle {
                    name: name.clone(),
                    source,
                })
                .ok_or(RegistryError::TypeMismatch {
                    name: name.to_string(),
                }),
            EntryKind::Derived(_) | EntryKind::Output => Err(RegistryError::TypeMismatch {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a derived binding declared under this scope.
    pub fn resolve_derived<T: Clone + 'static>(
        &self,
        local: &str,
    ) -> Result<DerivedHandle<T>, RegistryError> {
        let name = self.qualify(local)?;
        let inner = self.registry.inner.borrow();
        let entry = inner.entries.get(&name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
        match &entry.kind {
            EntryKind::Derived(any) => any
                .downcast_ref::<Computed<T>>()
                .cloned()
                .map(|cell| DerivedHandle {
                    name: name.clone(),
                    cell,
                })
                .ok_or(RegistryError::TypeMismatch {
                    name: name.to_string(),
                }),
            EntryKind::Input(_) | EntryKind::Output => Err(RegistryError::TypeMismatch {
                name: name.to_string(),
            }),
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.registry.teardown(&self.path);
    }
}

/// Typed handle to a declared input binding.
#[derive(Clone)]
pub struct InputHandle<T> {
    name: FullName,
    source: Source<T>,
}

impl<T> fmt::Debug for InputHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputHandle").field("name", &self.name.to_string()).finish()
    }
}

impl<T: Clone + PartialEq + 'static> InputHandle<T> {
    /// The fully-qualified name this input was declared under.
    #[must_use]
    pub fn name(&self) -> &FullName {
        &self.name
    }

    /// The underlying source cell.
    #[must_use]
    pub fn cell(&self) -> &Source<T> {
        &self.source
    }

    /// Read the current value.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.source.get()
    }

    /// Set a new value, invalidating dependents. Equal values are a no-op.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        self.source.set(value)
    }
}

/// Typed handle to a declared derived binding.
#[derive(Clone)]
pub struct DerivedHandle<T> {
    name: FullName,
    cell: Computed<T>,
}

impl<T> fmt::Debug for DerivedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedHandle").field("name", &self.name.to_string()).finish()
    }
}

impl<T: Clone + 'static> DerivedHandle<T> {
    /// The fully-qualified name this binding was declared under.
    #[must_use]
    pub fn name(&self) -> &FullName {
        &self.name
    }

    /// The underlying computed cell.
    #[must_use]
    pub fn cell(&self) -> &Computed<T> {
        &self.cell
    }

    /// Read the memoized value, recomputing if dirty.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn declared_names_are_qualified() {
        let registry = Registry::new();
        let hist = registry.root_scope("hist1").unwrap();
        let bins = hist.input("bins", 30_u32).unwrap();
        assert_eq!(bins.name().to_string(), "hist1-bins");
    }

    #[test]
    fn sibling_inputs_do_not_collide() {
        let registry = Registry::new();
        let hist1 = registry.root_scope("hist1").unwrap();
        let hist2 = registry.root_scope("hist2").unwrap();

        let bins1 = hist1.input("bins", 10_u32).unwrap();
        let bins2 = hist2.input("bins", 20_u32).unwrap();
        assert_ne!(bins1.name(), bins2.name());

        bins1.set(11).unwrap();
        assert_eq!(bins1.get().unwrap(), 11);
        assert_eq!(bins2.get().unwrap(), 20);
    }

    #[test]
    fn resolve_is_scoped_to_own_path() {
        let registry = Registry::new();
        let hist1 = registry.root_scope("hist1").unwrap();
        let hist2 = registry.root_scope("hist2").unwrap();
        hist1.input("bins", 10_u32).unwrap();

        assert!(hist1.resolve_input::<u32>("bins").is_ok());
        assert!(matches!(
            hist2.resolve_input::<u32>("bins"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let registry = Registry::new();
        let scope = registry.root_scope("a").unwrap();
        let err = scope.resolve_input::<u32>("missing").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound {
                name: "a-missing".into()
            }
        );
    }

    #[test]
    fn resolve_with_wrong_type_fails() {
        let registry = Registry::new();
        let scope = registry.root_scope("a").unwrap();
        scope.input("x", 1_u32).unwrap();

        assert!(matches!(
            scope.resolve_input::<String>("x"),
            Err(RegistryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn resolve_input_as_derived_fails() {
        let registry = Registry::new();
        let scope = registry.root_scope("a").unwrap();
        scope.input("x", 1_u32).unwrap();

        assert!(matches!(
            scope.resolve_derived::<u32>("x"),
            Err(RegistryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn resolved_handle_shares_the_cell() {
        let registry = Registry::new();
        let scope = registry.root_scope("a").unwrap();
        let declared = scope.input("x", 1_u32).unwrap();
        let resolved = scope.resolve_input::<u32>("x").unwrap();

        resolved.set(5).unwrap();
        assert_eq!(declared.get().unwrap(), 5);
    }

    #[test]
    fn derived_tracks_scope_inputs() {
        let registry = Registry::new();
        let scope = registry.root_scope("hist1").unwrap();
        let bins = scope.input("bins", 30_u32).unwrap();
        let label = scope
            .derived("label", {
                let bins = bins.cell().clone();
                move || Ok(format!("{} bins", bins.get()?))
            })
            .unwrap();

        assert_eq!(label.get().unwrap(), "30 bins");
        bins.set(40).unwrap();
        assert_eq!(label.get().unwrap(), "40 bins");
    }

    #[test]
    fn duplicate_declare_overwrites() {
        let registry = Registry::new();
        let scope = registry.root_scope("a").unwrap();
        let first = scope.input("x", 1_u32).unwrap();
        let second = scope.input("x", 99_u32).unwrap();

        assert_eq!(registry.binding_count(), 1);
        assert_eq!(second.get().unwrap(), 99);
        // The first handle's cell was released with the overwrite.
        assert!(first.get().is_err());
    }

    #[test]
    fn nested_scope_paths_compose() {
        let registry = Registry::new();
        let outer = registry.root_scope("outer").unwrap();
        let inner = outer.child("inner").unwrap();
        let x = inner.input("x", 1_u32).unwrap();
        assert_eq!(x.name().to_string(), "outer-inner-x");
    }

    #[test]
    fn drop_tears_down_scope_bindings() {
        let registry = Registry::new();
        let keeper = registry.root_scope("keeper").unwrap();
        let kept = keeper.input("x", 1_u32).unwrap();

        let doomed_handle = {
            let doomed = registry.root_scope("doomed").unwrap();
            doomed.input("y", 2_u32).unwrap()
        };

        assert_eq!(registry.binding_count(), 1);
        assert!(kept.get().is_ok());
        assert!(doomed_handle.get().is_err(), "cell released on teardown");
        assert!(matches!(
            keeper.resolve_input::<u32>("x"),
            Ok(_)
        ));
    }

    #[test]
    fn parent_drop_tears_down_descendants() {
        let registry = Registry::new();
        let inner_handle = {
            let outer = registry.root_scope("outer").unwrap();
            let inner = outer.child("inner").unwrap();
            let handle = inner.input("x", 1_u32).unwrap();
            // Keep `inner` alive past `outer`: drop order is outer first.
            drop(outer);
            assert!(handle.get().is_err(), "parent teardown covers descendants");
            drop(inner);
            handle
        };
        assert!(inner_handle.get().is_err());
        assert_eq!(registry.binding_count(), 0);
    }

    #[test]
    fn outputs_render_through_flush() {
        let registry = Registry::new();
        let scope = registry.root_scope("hist1").unwrap();
        let bins = scope.input("bins", 3_u32).unwrap();
        let rendered: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        scope
            .output(
                "plot",
                {
                    let bins = bins.cell().clone();
                    move || Ok(format!("plot with {} bins", bins.get()?))
                },
                {
                    let rendered = Rc::clone(&rendered);
                    move |text: &String| rendered.borrow_mut().push(text.clone())
                },
            )
            .unwrap();

        let report = registry.flush().unwrap();
        assert_eq!(report.rendered, 1);
        assert_eq!(*rendered.borrow(), ["plot with 3 bins"]);

        // No change, no render.
        let report = registry.flush().unwrap();
        assert_eq!(report.rendered, 0);

        bins.set(5).unwrap();
        registry.flush().unwrap();
        assert_eq!(
            *rendered.borrow(),
            ["plot with 3 bins", "plot with 5 bins"]
        );
    }
}

#![forbid(unsafe_code)]

//! Fully-qualified names: a scope path plus a local name.

use core::fmt;

use crate::{NameError, SEPARATOR, check_segment, path::ScopePath};

/// A fully-qualified binding name.
///
/// Rendered by joining every scope segment and the local name with the
/// reserved separator, so `qualify(["hist1"], "bins")` and
/// `qualify(["hist2"], "bins")` are `hist1-bins` and `hist2-bins` — equal
/// local names under different scopes never collide.
///
/// # Example
///
/// ```
/// use rxmod_ns::{FullName, ScopePath, qualify};
///
/// let scope = ScopePath::root().child("hist1")?;
/// let name = qualify(&scope, "bins")?;
/// assert_eq!(name.to_string(), "hist1-bins");
/// assert_eq!(FullName::parse("hist1-bins")?, name);
/// # Ok::<(), rxmod_ns::NameError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullName {
    scope: ScopePath,
    local: String,
}

/// Qualify `local` under `scope`.
///
/// Fails with [`NameError`] when the local name is empty or contains the
/// reserved separator.
pub fn qualify(scope: &ScopePath, local: impl Into<String>) -> Result<FullName, NameError> {
    let local = local.into();
    check_segment(&local)?;
    Ok(FullName {
        scope: scope.clone(),
        local,
    })
}

impl FullName {
    /// The scope path this name is qualified under.
    #[must_use]
    pub fn scope(&self) -> &ScopePath {
        &self.scope
    }

    /// The local (unqualified) name.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Whether this name is qualified under `scope` or a descendant of it.
    #[must_use]
    pub fn is_within(&self, scope: &ScopePath) -> bool {
        self.scope.starts_with(scope)
    }

    /// Parse a rendered name back into its `(scope path, local name)` pair.
    ///
    /// The last separator-delimited component is the local name; the
    /// preceding components form the scope path. Inverse of `to_string`.
    pub fn parse(rendered: &str) -> Result<Self, NameError> {
        let mut components: Vec<&str> = rendered.split(SEPARATOR).collect();
        // split always yields at least one component
        let local = components.pop().unwrap_or_default().to_owned();
        check_segment(&local)?;
        let scope = ScopePath::from_segments(components)?;
        Ok(Self { scope, local })
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.scope.segments() {
            write!(f, "{segment}{SEPARATOR}")?;
        }
        write!(f, "{}", self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(segments: &[&str]) -> ScopePath {
        ScopePath::from_segments(segments.iter().copied()).unwrap()
    }

    #[test]
    fn qualify_joins_with_separator() {
        let name = qualify(&scope(&["hist1"]), "bins").unwrap();
        assert_eq!(name.to_string(), "hist1-bins");
        assert_eq!(name.local(), "bins");
        assert_eq!(name.scope(), &scope(&["hist1"]));
    }

    #[test]
    fn sibling_scopes_never_collide() {
        let a = qualify(&scope(&["hist1"]), "bins").unwrap();
        let b = qualify(&scope(&["hist2"]), "bins").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn root_scope_renders_bare_local() {
        let name = qualify(&ScopePath::root(), "bins").unwrap();
        assert_eq!(name.to_string(), "bins");
    }

    #[test]
    fn nested_scopes_render_all_segments() {
        let name = qualify(&scope(&["outer", "inner"]), "count").unwrap();
        assert_eq!(name.to_string(), "outer-inner-count");
    }

    #[test]
    fn qualify_rejects_bad_local_names() {
        let s = scope(&["a"]);
        assert_eq!(qualify(&s, ""), Err(NameError::Empty));
        assert!(matches!(
            qualify(&s, "b-c"),
            Err(NameError::ReservedSeparator(_))
        ));
    }

    #[test]
    fn parse_inverts_display() {
        let name = qualify(&scope(&["outer", "inner"]), "count").unwrap();
        assert_eq!(FullName::parse(&name.to_string()).unwrap(), name);

        let bare = qualify(&ScopePath::root(), "count").unwrap();
        assert_eq!(FullName::parse("count").unwrap(), bare);
    }

    #[test]
    fn parse_rejects_empty_components() {
        assert_eq!(FullName::parse(""), Err(NameError::Empty));
        assert_eq!(FullName::parse("a-"), Err(NameError::Empty));
        assert_eq!(FullName::parse("-a"), Err(NameError::Empty));
        assert_eq!(FullName::parse("a--b"), Err(NameError::Empty));
    }

    #[test]
    fn is_within_follows_scope_prefix() {
        let name = qualify(&scope(&["a", "b"]), "x").unwrap();
        assert!(name.is_within(&scope(&["a"])));
        assert!(name.is_within(&scope(&["a", "b"])));
        assert!(name.is_within(&ScopePath::root()));
        assert!(!name.is_within(&scope(&["c"])));
    }
}

#[cfg(test)]
mod props {
    use proptest::prelude::*;

    use super::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,7}"
    }

    fn scope_path() -> impl Strategy<Value = ScopePath> {
        proptest::collection::vec(segment(), 0..4)
            .prop_map(|segments| ScopePath::from_segments(segments).unwrap())
    }

    proptest! {
        #[test]
        fn distinct_scopes_distinct_names(a in scope_path(), b in scope_path(), local in segment()) {
            let qa = qualify(&a, local.clone()).unwrap();
            let qb = qualify(&b, local).unwrap();
            prop_assert_eq!(a == b, qa.to_string() == qb.to_string());
        }

        #[test]
        fn render_parse_round_trip(scope in scope_path(), local in segment()) {
            let name = qualify(&scope, local).unwrap();
            let parsed = FullName::parse(&name.to_string()).unwrap();
            prop_assert_eq!(parsed, name);
        }
    }
}

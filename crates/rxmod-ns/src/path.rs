#![forbid(unsafe_code)]

//! Scope paths: ordered, validated scope identifiers.

use core::fmt;

use crate::{NameError, check_segment};

/// An immutable path of scope identifiers, root outward.
///
/// The empty path is the top level. Each segment is validated on
/// construction (non-empty, no reserved separator), so any two distinct
/// paths render distinct fully-qualified names.
///
/// Displayed with `/` between segments for diagnostics, e.g.
/// `parent/child`; the `/` plays no role in qualified-name rendering.
///
/// # Example
///
/// ```
/// use rxmod_ns::ScopePath;
///
/// let root = ScopePath::root();
/// let hist = root.child("hist1")?;
/// assert_eq!(hist.to_string(), "hist1");
/// assert_eq!(hist.child("inner")?.to_string(), "hist1/inner");
/// # Ok::<(), rxmod_ns::NameError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopePath {
    segments: Vec<String>,
}

impl ScopePath {
    /// The top-level (empty) path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from an iterator of segments, validating each.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for segment in segments {
            let segment = segment.into();
            check_segment(&segment)?;
            out.push(segment);
        }
        Ok(Self { segments: out })
    }

    /// Return a new path extended by one scope identifier.
    pub fn child(&self, id: impl Into<String>) -> Result<Self, NameError> {
        let id = id.into();
        check_segment(&id)?;
        let mut segments = self.segments.clone();
        segments.push(id);
        Ok(Self { segments })
    }

    /// The validated segments, root outward.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the top-level path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Nesting depth (number of segments).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The innermost scope identifier, if any.
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The enclosing path, or `None` at the top level.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `prefix` is this path or one of its ancestors.
    ///
    /// Used by the registry to decide which entries a scope owns.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = ScopePath::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.leaf(), None);
        assert_eq!(root.parent(), None);
        assert_eq!(root.to_string(), "");
    }

    #[test]
    fn child_extends_path() {
        let path = ScopePath::root().child("a").unwrap().child("b").unwrap();
        assert_eq!(path.segments(), ["a", "b"]);
        assert_eq!(path.depth(), 2);
        assert_eq!(path.leaf(), Some("b"));
        assert_eq!(path.to_string(), "a/b");
    }

    #[test]
    fn child_does_not_mutate_parent() {
        let parent = ScopePath::root().child("a").unwrap();
        let _child = parent.child("b").unwrap();
        assert_eq!(parent.segments(), ["a"]);
    }

    #[test]
    fn child_rejects_bad_ids() {
        let root = ScopePath::root();
        assert_eq!(root.child(""), Err(NameError::Empty));
        assert!(matches!(
            root.child("x-y"),
            Err(NameError::ReservedSeparator(_))
        ));
    }

    #[test]
    fn from_segments_validates_all() {
        assert!(ScopePath::from_segments(["a", "b"]).is_ok());
        assert!(ScopePath::from_segments(["a", "b-c"]).is_err());
    }

    #[test]
    fn parent_walks_back_to_root() {
        let path = ScopePath::from_segments(["a", "b"]).unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.segments(), ["a"]);
        assert_eq!(parent.parent().unwrap(), ScopePath::root());
    }

    #[test]
    fn starts_with_prefixes() {
        let root = ScopePath::root();
        let a = root.child("a").unwrap();
        let ab = a.child("b").unwrap();
        let ac = a.child("c").unwrap();

        assert!(ab.starts_with(&root));
        assert!(ab.starts_with(&a));
        assert!(ab.starts_with(&ab));
        assert!(!ab.starts_with(&ac));
        assert!(!a.starts_with(&ab));
    }

    #[test]
    fn starts_with_compares_whole_segments() {
        let ab = ScopePath::from_segments(["ab"]).unwrap();
        let a = ScopePath::from_segments(["a"]).unwrap();
        assert!(!ab.starts_with(&a), "prefix match must be segment-wise");
    }
}

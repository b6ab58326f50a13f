//! Positional step addressing.
//!
//! A [`StepPath`] selects a node in a step tree by listing, from the root
//! downwards, the 1-based index of the child taken at every level. The
//! canonical string form is `"(i1 i2 ... in)"`; external tooling keys step
//! state by that exact string, so it must not change.

use crate::errors::InvalidPathError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Root-relative, 1-based position of a step in a tree.
///
/// Ordering is lexicographic over the indices, which is the same order as a
/// pre-order walk of the tree: `(1) < (1 1) < (1 2) < (2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StepPath(Vec<u32>);

impl StepPath {
    /// The empty path. It denotes the implicit root container and is never
    /// addressable as a step on its own.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from raw indices.
    ///
    /// # Errors
    ///
    /// Returns an error if any index is zero.
    pub fn new(indices: impl Into<Vec<u32>>) -> Result<Self, InvalidPathError> {
        let indices = indices.into();
        if let Some(position) = indices.iter().position(|&i| i == 0) {
            return Err(InvalidPathError::ZeroIndex {
                path: render(&indices),
                position,
            });
        }
        Ok(Self(indices))
    }

    /// Path of a top-level step.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is zero.
    pub fn top_level(index: u32) -> Result<Self, InvalidPathError> {
        Self::new(vec![index])
    }

    /// Returns the path of the `index`-th (1-based) child of this node.
    ///
    /// Does not modify `self`.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        debug_assert!(index > 0, "step indices are 1-based");
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    /// Returns the enclosing container's path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// The indices, outermost first.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Number of levels below the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Alias of [`StepPath::is_root`] for collection-like call sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Returns true if the path addresses a direct child of the root.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// Returns true if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }
}

fn render(indices: &[u32]) -> String {
    let inner: Vec<String> = indices.iter().map(u32::to_string).collect();
    format!("({})", inner.join(" "))
}

impl fmt::Display for StepPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{index}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for StepPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| InvalidPathError::Malformed {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| malformed("expected a parenthesized list of indices"))?;

        let mut indices = Vec::new();
        for token in inner.split_whitespace() {
            let index: u32 = token
                .parse()
                .map_err(|_| malformed(&format!("'{token}' is not a positive integer")))?;
            indices.push(index);
        }

        if indices.is_empty() {
            return Err(InvalidPathError::Empty);
        }
        Self::new(indices)
    }
}

impl TryFrom<&str> for StepPath {
    type Error = InvalidPathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for StepPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

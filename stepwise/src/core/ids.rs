//! Build and trigger identifiers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use uuid::Uuid;

/// Opaque identifier of one build run.
///
/// Ordering is numeric-aware: two purely numeric IDs compare by value, so
/// `"9" < "10"` even though the strings sort the other way. Numeric IDs
/// order before non-numeric ones, and ties fall back to the raw string so
/// the ordering stays consistent with equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of the identifier, if it is one.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BuildId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Ord for BuildId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for BuildId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Hands out monotonically increasing numeric build IDs.
#[derive(Debug)]
pub struct BuildIdGenerator {
    last: AtomicU64,
}

impl Default for BuildIdGenerator {
    fn default() -> Self {
        Self::starting_after(0)
    }
}

impl BuildIdGenerator {
    /// Creates a generator whose first ID is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator whose first ID is `last + 1`.
    #[must_use]
    pub const fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Creates a generator that continues after the highest numeric ID in
    /// `existing`. Non-numeric IDs are ignored.
    #[must_use]
    pub fn resuming<'a>(existing: impl IntoIterator<Item = &'a BuildId>) -> Self {
        let last = existing
            .into_iter()
            .filter_map(BuildId::as_number)
            .max()
            .unwrap_or(0);
        Self::starting_after(last)
    }

    /// Returns the next unused ID.
    pub fn next_id(&self) -> BuildId {
        let id = self.last.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        BuildId(id.to_string())
    }
}

/// Opaque, globally unique token handed to external callers for firing a
/// manual step.
///
/// Tokens are random 128-bit values and carry no information about the
/// build or step they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    /// Generates a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps a token received from outside.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TriggerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_build_id_numeric_ordering() {
        let mut ids: Vec<BuildId> = ["10", "9", "abc", "2", "100"]
            .into_iter()
            .map(BuildId::from)
            .collect();
        ids.sort();
        let rendered: Vec<&str> = ids.iter().map(BuildId::as_str).collect();
        assert_eq!(rendered, vec!["2", "9", "10", "100", "abc"]);
    }

    #[test]
    fn test_build_id_ordering_consistent_with_eq() {
        let a = BuildId::from("007");
        let b = BuildId::from("7");
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_generator_is_monotonic() {
        let generator = BuildIdGenerator::new();
        assert_eq!(generator.next_id().as_str(), "1");
        assert_eq!(generator.next_id().as_str(), "2");
    }

    #[test]
    fn test_generator_resumes_after_existing() {
        let existing = vec![BuildId::from("3"), BuildId::from("41"), BuildId::from("nightly")];
        let generator = BuildIdGenerator::resuming(&existing);
        assert_eq!(generator.next_id().as_str(), "42");
    }

    #[test]
    fn test_generator_unique_under_contention() {
        let generator = Arc::new(BuildIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || (0..100).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn test_trigger_ids_are_opaque_and_unique() {
        let a = TriggerId::generate();
        let b = TriggerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    }
}

//! Provider availability snapshots
//!
//! A snapshot holds three categories of provider entries (rent, buy,
//! flatrate). Two rules govern comparison:
//!
//! - A snapshot with every category empty is normalized to "absent"
//!   (`None`), so "never fetched" and "fetched, no providers" compare equal.
//! - Categories compare as sets: entry order and repeated entries never
//!   make two snapshots differ.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One provider offering a movie
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Provider identifier from the metadata source
    pub provider_id: i64,
    /// Display name (e.g. "Netflix")
    pub provider_name: String,
    /// Logo image path, relative to the metadata source's image base URL
    #[serde(default)]
    pub logo_path: Option<String>,
}

impl ProviderEntry {
    pub fn new(provider_id: i64, provider_name: impl Into<String>) -> Self {
        Self {
            provider_id,
            provider_name: provider_name.into(),
            logo_path: None,
        }
    }

    pub fn with_logo(mut self, logo_path: impl Into<String>) -> Self {
        self.logo_path = Some(logo_path.into());
        self
    }
}

/// Provider availability for one movie in one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    #[serde(default)]
    pub rent: Vec<ProviderEntry>,
    #[serde(default)]
    pub buy: Vec<ProviderEntry>,
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
}

impl ProviderSnapshot {
    /// Create a snapshot with only flatrate (subscription) providers
    pub fn flatrate(entries: Vec<ProviderEntry>) -> Self {
        Self {
            flatrate: entries,
            ..Self::default()
        }
    }

    /// Whether all three categories are empty
    pub fn is_empty(&self) -> bool {
        self.rent.is_empty() && self.buy.is_empty() && self.flatrate.is_empty()
    }

    /// Apply the empty-to-absent rule
    pub fn normalize(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

fn same_entries(a: &[ProviderEntry], b: &[ProviderEntry]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

impl PartialEq for ProviderSnapshot {
    fn eq(&self, other: &Self) -> bool {
        same_entries(&self.rent, &other.rent)
            && same_entries(&self.buy, &other.buy)
            && same_entries(&self.flatrate, &other.flatrate)
    }
}

impl Eq for ProviderSnapshot {}

/// Result of comparing a stored snapshot with a freshly fetched one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDiff {
    /// Both absent, or both present with the same entries
    Unchanged,
    /// Nothing stored, providers now available
    Appeared,
    /// Both present, entries differ
    Changed,
    /// Providers stored, none available any more
    Withdrawn,
}

impl SnapshotDiff {
    /// Whether the new snapshot must be persisted and announced
    pub fn is_change(self) -> bool {
        !matches!(self, SnapshotDiff::Unchanged)
    }
}

/// Compare two normalized snapshots
pub fn diff(stored: Option<&ProviderSnapshot>, fetched: Option<&ProviderSnapshot>) -> SnapshotDiff {
    match (stored, fetched) {
        (None, None) => SnapshotDiff::Unchanged,
        (None, Some(_)) => SnapshotDiff::Appeared,
        (Some(_), None) => SnapshotDiff::Withdrawn,
        (Some(old), Some(new)) if old == new => SnapshotDiff::Unchanged,
        (Some(_), Some(_)) => SnapshotDiff::Changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn netflix() -> ProviderEntry {
        ProviderEntry::new(8, "Netflix").with_logo("/netflix.jpg")
    }

    fn apple() -> ProviderEntry {
        ProviderEntry::new(2, "Apple TV").with_logo("/apple.jpg")
    }

    fn google() -> ProviderEntry {
        ProviderEntry::new(3, "Google Play Movies")
    }

    #[test]
    fn empty_snapshot_normalizes_to_absent() {
        assert_eq!(ProviderSnapshot::default().normalize(), None);
        assert!(ProviderSnapshot::flatrate(vec![netflix()]).normalize().is_some());
    }

    #[test]
    fn reordered_entries_are_unchanged() {
        let a = ProviderSnapshot {
            rent: vec![apple(), google()],
            buy: vec![google(), apple()],
            flatrate: vec![netflix()],
        };
        let b = ProviderSnapshot {
            rent: vec![google(), apple()],
            buy: vec![apple(), google()],
            flatrate: vec![netflix()],
        };

        assert_eq!(diff(Some(&a), Some(&b)), SnapshotDiff::Unchanged);
    }

    #[test]
    fn entries_compare_per_category() {
        let rent = ProviderSnapshot {
            rent: vec![apple()],
            ..Default::default()
        };
        let buy = ProviderSnapshot {
            buy: vec![apple()],
            ..Default::default()
        };

        assert_eq!(diff(Some(&rent), Some(&buy)), SnapshotDiff::Changed);
    }

    #[test]
    fn logo_change_is_a_change() {
        let a = ProviderSnapshot::flatrate(vec![netflix()]);
        let b = ProviderSnapshot::flatrate(vec![ProviderEntry::new(8, "Netflix").with_logo("/new.jpg")]);

        assert!(diff(Some(&a), Some(&b)).is_change());
    }

    #[test]
    fn presence_transitions() {
        let some = ProviderSnapshot::flatrate(vec![netflix()]);

        assert_eq!(diff(None, None), SnapshotDiff::Unchanged);
        assert_eq!(diff(None, Some(&some)), SnapshotDiff::Appeared);
        assert_eq!(diff(Some(&some), None), SnapshotDiff::Withdrawn);
        assert!(!SnapshotDiff::Unchanged.is_change());
    }
}

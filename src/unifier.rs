//! Unification of direct and derived equivalences
//!
//! Concatenate direct entries, then derived ones, drop later duplicates.
//! Direct provenance therefore always beats Derived for the same key.
//! No arithmetic happens here.

use crate::logging::TARGET_RECORD;
use crate::models::EquivalenceEntry;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Identity used for deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// One row per asset
    #[default]
    Asset,
    /// One row per source symbol
    Symbol,
}

impl DedupKey {
    pub fn of<'a>(&self, entry: &'a EquivalenceEntry) -> &'a str {
        match self {
            DedupKey::Asset => &entry.asset,
            DedupKey::Symbol => &entry.source_symbol,
        }
    }
}

/// Counts describing one unification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnificationSummary {
    pub direct_rows: usize,
    pub derived_rows: usize,
    /// Rows dropped because their key was already present
    pub duplicates_resolved: usize,
}

impl UnificationSummary {
    pub fn total(&self) -> usize {
        self.direct_rows + self.derived_rows
    }
}

/// Deduplicated equivalence table, direct rows first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTable {
    entries: Vec<EquivalenceEntry>,
    summary: UnificationSummary,
}

impl CanonicalTable {
    pub fn entries(&self) -> &[EquivalenceEntry] {
        &self.entries
    }

    pub fn summary(&self) -> UnificationSummary {
        self.summary
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, asset: &str) -> Option<&EquivalenceEntry> {
        self.entries.iter().find(|e| e.asset == asset)
    }

    /// Same rows ordered by `asset`, then `source_symbol`.
    pub fn sorted_by_asset(&self) -> Vec<&EquivalenceEntry> {
        let mut rows: Vec<_> = self.entries.iter().collect();
        rows.sort_by(|a, b| {
            a.asset
                .cmp(&b.asset)
                .then_with(|| a.source_symbol.cmp(&b.source_symbol))
        });
        rows
    }
}

/// Merge `direct` and `derived` into one table keyed by `key`, first wins.
pub fn unify(
    direct: &[EquivalenceEntry],
    derived: &[EquivalenceEntry],
    key: DedupKey,
) -> CanonicalTable {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut entries = Vec::with_capacity(direct.len() + derived.len());
    let mut summary = UnificationSummary::default();

    for entry in direct.iter().chain(derived.iter()) {
        if !seen.insert(key.of(entry)) {
            summary.duplicates_resolved += 1;
            tracing::debug!(
                target: TARGET_RECORD,
                key = key.of(entry),
                dropped = %entry.source_symbol,
                provenance = %entry.provenance,
                "Duplicate resolved by precedence"
            );
            continue;
        }
        if entry.is_derived() {
            summary.derived_rows += 1;
        } else {
            summary.direct_rows += 1;
        }
        entries.push(entry.clone());
    }

    tracing::info!(
        direct = summary.direct_rows,
        derived = summary.derived_rows,
        duplicates = summary.duplicates_resolved,
        "Unified equivalence table: {} rows",
        summary.total()
    );
    CanonicalTable { entries, summary }
}

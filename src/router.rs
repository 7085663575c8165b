//! One-hop routing of Indirect pairs
//!
//! For `BASE/QUOTE` with price `p` and a known equivalence for `QUOTE`
//! (`q` = reference units per QUOTE):
//!
//! ```text
//! ref_per_asset(BASE) = q / p
//! asset_per_ref(BASE) = p / q
//! ```
//!
//! Only one hop: if QUOTE has no known equivalence the pair is unrouted,
//! no search through further intermediates is attempted.

use crate::core_types::AssetCode;
use crate::error::SkipReason;
use crate::logging::TARGET_RECORD;
use crate::models::{CoverageReport, EquivalenceEntry, PairRecord, Provenance, UnroutedPair};
use crate::precision::PrecisionPolicy;
use crate::ticker::TickerSnapshot;
use rustc_hash::FxHashMap;

/// Known equivalences keyed by asset. Read-only during routing.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceMap {
    by_asset: FxHashMap<AssetCode, EquivalenceEntry>,
}

impl EquivalenceMap {
    /// Index `entries` by asset; the first entry for an asset wins.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a EquivalenceEntry>) -> Self {
        let mut by_asset: FxHashMap<AssetCode, EquivalenceEntry> = FxHashMap::default();
        for entry in entries {
            by_asset
                .entry(entry.asset.clone())
                .or_insert_with(|| entry.clone());
        }
        EquivalenceMap { by_asset }
    }

    pub fn get(&self, asset: &str) -> Option<&EquivalenceEntry> {
        self.by_asset.get(asset)
    }
}

/// Result of the routing stage.
#[derive(Debug, Clone)]
pub struct RoutingOutcome {
    /// Input order, one per routed pair (an asset may appear more than once)
    pub routed: Vec<EquivalenceEntry>,
    pub unrouted: Vec<UnroutedPair>,
    pub report: CoverageReport,
}

/// Route a single Indirect pair. `Err` carries why it stays unrouted.
pub fn route_pair(
    pair: &PairRecord,
    known: &EquivalenceMap,
    snapshot: &TickerSnapshot,
    policy: &PrecisionPolicy,
) -> Result<EquivalenceEntry, SkipReason> {
    for (name, value) in [
        ("symbol", &pair.symbol),
        ("base", &pair.base),
        ("quote", &pair.quote),
    ] {
        if value.is_empty() {
            return Err(SkipReason::MissingField(name));
        }
    }

    let via = known
        .get(&pair.quote)
        .ok_or_else(|| SkipReason::UnknownQuote(pair.quote.clone()))?;
    let price = snapshot.price(&pair.symbol)?;

    let arithmetic = |e: crate::precision::PrecisionError| SkipReason::Arithmetic(e.to_string());
    let reference_per_base = policy
        .divide(&via.units_of_reference_per_asset, &price)
        .map_err(arithmetic)?;

    EquivalenceEntry::from_reference_per_asset(
        pair,
        &pair.base,
        reference_per_base,
        Provenance::Derived,
        policy,
    )
    .map_err(arithmetic)
}

/// Resolve Indirect pairs through `known`, one hop at most.
///
/// Never fails: a bad record lands in `unrouted` and the batch continues.
pub fn route_indirect(
    indirect: &[PairRecord],
    known: &EquivalenceMap,
    snapshot: &TickerSnapshot,
    policy: &PrecisionPolicy,
) -> RoutingOutcome {
    let mut routed = Vec::with_capacity(indirect.len());
    let mut unrouted = Vec::new();

    for pair in indirect {
        match route_pair(pair, known, snapshot, policy) {
            Ok(entry) => routed.push(entry),
            Err(reason) => {
                tracing::warn!(
                    target: TARGET_RECORD,
                    symbol = %pair.symbol,
                    %reason,
                    "Unrouted indirect pair"
                );
                unrouted.push(UnroutedPair {
                    pair: pair.clone(),
                    reason,
                });
            }
        }
    }

    let report = CoverageReport::new(indirect.len(), routed.len(), unrouted.len());
    tracing::info!(
        total = report.total_indirect,
        routed = report.routed,
        unrouted = report.unrouted,
        "Indirect routing coverage {:.2}%",
        report.ratio_percent
    );

    RoutingOutcome {
        routed,
        unrouted,
        report,
    }
}

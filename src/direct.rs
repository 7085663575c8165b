//! Direct equivalences: pairs with the reference on one leg
//!
//! ```text
//! Direct   ASSET/REF  price p = "1 ASSET = p REF"  -> ref_per_asset = p,   asset_per_ref = 1/p
//! Inverted REF/ASSET  price p = "1 REF = p ASSET"  -> ref_per_asset = 1/p, asset_per_ref = p
//! ```
//!
//! Both topologies yield `Provenance::Direct`: the price is observed, not
//! routed. One entry per asset; when several symbols produce the same
//! asset the configured [`TieBreak`] picks the survivor.

use crate::classifier::Topology;
use crate::error::SkipReason;
use crate::logging::TARGET_RECORD;
use crate::models::{EquivalenceEntry, PairRecord, Provenance, SkippedPair};
use crate::precision::PrecisionPolicy;
use crate::ticker::TickerSnapshot;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Which entry survives when one asset is priced by several symbols
/// (e.g. both `BTC/USDT` and `USDT/BTC` are listed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the first entry in input order. Direct pairs are visited before
    /// inverted ones, so an `ASSET/REF` quote wins over `REF/ASSET`.
    #[default]
    FirstSeen,
    /// Prefer a `REF/ASSET` quote over an `ASSET/REF` one
    PreferInverted,
}

impl TieBreak {
    fn replaces(&self, incumbent: Topology, challenger: Topology) -> bool {
        match self {
            TieBreak::FirstSeen => false,
            TieBreak::PreferInverted => {
                incumbent == Topology::Direct && challenger == Topology::Inverted
            }
        }
    }
}

/// Result of the direct stage.
#[derive(Debug, Clone, Default)]
pub struct DirectOutcome {
    /// One entry per asset, first-produced order
    pub entries: Vec<EquivalenceEntry>,
    pub skipped: Vec<SkippedPair>,
    /// Valid entries dropped by the tie-break
    pub superseded: usize,
}

/// Compute one direct entry. `Err` carries the skip reason.
pub fn direct_entry(
    pair: &PairRecord,
    topology: Topology,
    snapshot: &TickerSnapshot,
    policy: &PrecisionPolicy,
) -> Result<EquivalenceEntry, SkipReason> {
    if pair.symbol.is_empty() {
        return Err(SkipReason::MissingField("symbol"));
    }
    let price = snapshot.price(&pair.symbol)?;

    let built = match topology {
        Topology::Direct => {
            if pair.base.is_empty() {
                return Err(SkipReason::MissingField("base"));
            }
            EquivalenceEntry::from_reference_per_asset(
                pair,
                &pair.base,
                price,
                Provenance::Direct,
                policy,
            )
        }
        Topology::Inverted => {
            if pair.quote.is_empty() {
                return Err(SkipReason::MissingField("quote"));
            }
            EquivalenceEntry::from_asset_per_reference(
                pair,
                &pair.quote,
                price,
                Provenance::Direct,
                policy,
            )
        }
        Topology::Indirect => {
            return Err(SkipReason::Arithmetic(
                "indirect pair passed to direct stage".into(),
            ));
        }
    };
    built.map_err(|e| SkipReason::Arithmetic(e.to_string()))
}

/// Turn Direct and Inverted pairs into reference equivalences.
///
/// Never fails: every pair either yields an entry or a [`SkippedPair`].
pub fn compute_direct(
    direct: &[PairRecord],
    inverted: &[PairRecord],
    snapshot: &TickerSnapshot,
    policy: &PrecisionPolicy,
    tie_break: TieBreak,
) -> DirectOutcome {
    let mut outcome = DirectOutcome::default();
    // asset -> (index into entries, topology that produced it)
    let mut seen: FxHashMap<String, (usize, Topology)> = FxHashMap::default();

    let candidates = direct
        .iter()
        .map(|p| (p, Topology::Direct))
        .chain(inverted.iter().map(|p| (p, Topology::Inverted)));

    for (pair, topology) in candidates {
        let entry = match direct_entry(pair, topology, snapshot, policy) {
            Ok(entry) => entry,
            Err(reason) => {
                tracing::warn!(
                    target: TARGET_RECORD,
                    symbol = %pair.symbol,
                    %reason,
                    "Skipped direct pair"
                );
                outcome.skipped.push(SkippedPair {
                    pair: pair.clone(),
                    reason,
                });
                continue;
            }
        };

        match seen.get(&entry.asset).copied() {
            None => {
                seen.insert(entry.asset.clone(), (outcome.entries.len(), topology));
                outcome.entries.push(entry);
            }
            Some((idx, incumbent)) => {
                outcome.superseded += 1;
                if tie_break.replaces(incumbent, topology) {
                    tracing::debug!(
                        target: TARGET_RECORD,
                        asset = %entry.asset,
                        kept = %entry.source_symbol,
                        dropped = %outcome.entries[idx].source_symbol,
                        "Tie-break replaced direct entry"
                    );
                    seen.insert(entry.asset.clone(), (idx, topology));
                    outcome.entries[idx] = entry;
                } else {
                    tracing::debug!(
                        target: TARGET_RECORD,
                        asset = %entry.asset,
                        kept = %outcome.entries[idx].source_symbol,
                        dropped = %entry.source_symbol,
                        "Tie-break kept existing direct entry"
                    );
                }
            }
        }
    }

    tracing::info!(
        entries = outcome.entries.len(),
        skipped = outcome.skipped.len(),
        superseded = outcome.superseded,
        "Direct equivalences computed"
    );
    outcome
}

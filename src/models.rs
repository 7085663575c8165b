//! Domain records: pairs, equivalence entries, per-record failures, coverage

use crate::core_types::{AssetCode, Symbol};
use crate::error::SkipReason;
use crate::precision::{PrecisionError, PrecisionPolicy};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tradable pair as delivered by the upstream filter.
///
/// `symbol` is unique within a run, `base`/`quote` are the two legs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairRecord {
    pub symbol: Symbol,
    pub base: AssetCode,
    pub quote: AssetCode,
}

impl PairRecord {
    pub fn new(symbol: &str, base: &str, quote: &str) -> Self {
        PairRecord {
            symbol: symbol.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
        }
    }
}

/// Pairs split by their relationship to the reference currency.
///
/// Buckets are disjoint and keep input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedPairSet {
    /// `quote == reference`
    pub direct: Vec<PairRecord>,
    /// `base == reference`
    pub inverted: Vec<PairRecord>,
    /// neither leg is the reference
    pub indirect: Vec<PairRecord>,
}

impl ClassifiedPairSet {
    pub fn len(&self) -> usize {
        self.direct.len() + self.inverted.len() + self.indirect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an equivalence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Straight from the exchange price of a pair with the reference on one leg
    Direct,
    /// Routed through one known intermediate asset
    Derived,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Direct => "direct",
            Provenance::Derived => "derived",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of `asset` equals one unit of the reference, and the reverse.
///
/// Both quantities are strictly positive and reciprocal within working
/// precision. Entries are never edited; a different route means a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceEntry {
    pub asset: AssetCode,
    pub units_of_asset_per_reference: BigDecimal,
    pub units_of_reference_per_asset: BigDecimal,
    pub provenance: Provenance,
    /// Pair whose price produced this entry
    pub source_symbol: Symbol,
    pub base: AssetCode,
    pub quote: AssetCode,
}

impl EquivalenceEntry {
    /// Build from "reference per asset"; the reciprocal is derived.
    pub fn from_reference_per_asset(
        source: &PairRecord,
        asset: &str,
        reference_per_asset: BigDecimal,
        provenance: Provenance,
        policy: &PrecisionPolicy,
    ) -> Result<Self, PrecisionError> {
        let reference_per_asset = positive(policy.normalize(&reference_per_asset))?;
        let asset_per_reference = positive(policy.reciprocal(&reference_per_asset)?)?;
        Ok(Self::assemble(
            source,
            asset,
            asset_per_reference,
            reference_per_asset,
            provenance,
        ))
    }

    /// Build from "asset per reference"; the reciprocal is derived.
    pub fn from_asset_per_reference(
        source: &PairRecord,
        asset: &str,
        asset_per_reference: BigDecimal,
        provenance: Provenance,
        policy: &PrecisionPolicy,
    ) -> Result<Self, PrecisionError> {
        let asset_per_reference = positive(policy.normalize(&asset_per_reference))?;
        let reference_per_asset = positive(policy.reciprocal(&asset_per_reference)?)?;
        Ok(Self::assemble(
            source,
            asset,
            asset_per_reference,
            reference_per_asset,
            provenance,
        ))
    }

    fn assemble(
        source: &PairRecord,
        asset: &str,
        asset_per_reference: BigDecimal,
        reference_per_asset: BigDecimal,
        provenance: Provenance,
    ) -> Self {
        EquivalenceEntry {
            asset: asset.to_string(),
            units_of_asset_per_reference: asset_per_reference,
            units_of_reference_per_asset: reference_per_asset,
            provenance,
            source_symbol: source.symbol.clone(),
            base: source.base.clone(),
            quote: source.quote.clone(),
        }
    }

    #[inline]
    pub fn is_derived(&self) -> bool {
        self.provenance == Provenance::Derived
    }
}

fn positive(value: BigDecimal) -> Result<BigDecimal, PrecisionError> {
    if value <= BigDecimal::zero() {
        return Err(PrecisionError::NonPositive(value.to_string()));
    }
    Ok(value)
}

/// A Direct/Inverted pair that produced no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub pair: PairRecord,
    pub reason: SkipReason,
}

/// An Indirect pair that could not be routed to the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnroutedPair {
    pub pair: PairRecord,
    pub reason: SkipReason,
}

/// Routing coverage of one run. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub total_indirect: usize,
    pub routed: usize,
    pub unrouted: usize,
    pub ratio_percent: f64,
}

impl CoverageReport {
    pub fn new(total_indirect: usize, routed: usize, unrouted: usize) -> Self {
        let ratio_percent = if total_indirect == 0 {
            0.0
        } else {
            routed as f64 * 100.0 / total_indirect as f64
        };
        CoverageReport {
            total_indirect,
            routed,
            unrouted,
            ratio_percent,
        }
    }

    /// True when coverage is under `threshold_percent` (data-quality warning).
    ///
    /// An empty indirect set is not a warning: there was nothing to route.
    pub fn is_below(&self, threshold_percent: f64) -> bool {
        self.total_indirect > 0 && self.ratio_percent < threshold_percent
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "indirect={} routed={} unrouted={} coverage={:.2}%",
            self.total_indirect, self.routed, self.unrouted, self.ratio_percent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_entry_from_reference_per_asset_is_reciprocal() {
        let policy = PrecisionPolicy::default();
        let pair = PairRecord::new("BTC/USDT", "BTC", "USDT");
        let entry = EquivalenceEntry::from_reference_per_asset(
            &pair,
            "BTC",
            dec("50000"),
            Provenance::Direct,
            &policy,
        )
        .unwrap();

        assert_eq!(entry.asset, "BTC");
        assert_eq!(entry.source_symbol, "BTC/USDT");
        assert_eq!(entry.units_of_asset_per_reference, dec("0.00002"));
        assert!(!entry.is_derived());
    }

    #[test]
    fn test_entry_rejects_non_positive() {
        let policy = PrecisionPolicy::default();
        let pair = PairRecord::new("X/USDT", "X", "USDT");
        let zero = EquivalenceEntry::from_reference_per_asset(
            &pair,
            "X",
            dec("0"),
            Provenance::Direct,
            &policy,
        );
        assert!(zero.is_err());

        let negative = EquivalenceEntry::from_asset_per_reference(
            &pair,
            "X",
            dec("-2"),
            Provenance::Direct,
            &policy,
        );
        assert!(matches!(negative, Err(PrecisionError::NonPositive(_))));
    }

    #[test]
    fn test_coverage_ratio() {
        let report = CoverageReport::new(10, 7, 3);
        assert_eq!(format!("{:.2}", report.ratio_percent), "70.00");
        assert!(!report.is_below(50.0));
        assert!(report.is_below(75.0));
    }

    #[test]
    fn test_coverage_empty_is_zero_and_not_a_warning() {
        let report = CoverageReport::new(0, 0, 0);
        assert_eq!(report.ratio_percent, 0.0);
        assert!(!report.is_below(50.0));
        assert_eq!(
            report.to_string(),
            "indirect=0 routed=0 unrouted=0 coverage=0.00%"
        );
    }

    #[test]
    fn test_provenance_labels() {
        assert_eq!(Provenance::Direct.to_string(), "direct");
        assert_eq!(Provenance::Derived.as_str(), "derived");
    }
}

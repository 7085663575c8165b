//! Pair classification relative to the reference currency
//!
//! Pure, order-preserving, total: every well-formed pair lands in exactly
//! one bucket. Case normalization is the loader's job, not ours.

use crate::error::RefineryError;
use crate::models::{ClassifiedPairSet, PairRecord};

/// Which bucket a pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// `ASSET/REF`
    Direct,
    /// `REF/ASSET`
    Inverted,
    /// `A/B`, neither is the reference
    Indirect,
}

/// Topology of one pair. Rule order: quote first, then base.
///
/// # Errors
/// `InvalidPair` when both legs equal the reference.
pub fn topology_of(pair: &PairRecord, reference: &str) -> Result<Topology, RefineryError> {
    if pair.base == reference && pair.quote == reference {
        return Err(RefineryError::InvalidPair {
            symbol: pair.symbol.clone(),
            reason: format!("both legs equal the reference currency {}", reference),
        });
    }
    if pair.quote == reference {
        Ok(Topology::Direct)
    } else if pair.base == reference {
        Ok(Topology::Inverted)
    } else {
        Ok(Topology::Indirect)
    }
}

/// Split `pairs` into Direct / Inverted / Indirect buckets.
///
/// An empty input yields three empty buckets. A single malformed pair
/// fails the whole classification.
pub fn classify(pairs: &[PairRecord], reference: &str) -> Result<ClassifiedPairSet, RefineryError> {
    let mut set = ClassifiedPairSet::default();
    for pair in pairs {
        let bucket = match topology_of(pair, reference)? {
            Topology::Direct => &mut set.direct,
            Topology::Inverted => &mut set.inverted,
            Topology::Indirect => &mut set.indirect,
        };
        bucket.push(pair.clone());
    }
    tracing::debug!(
        direct = set.direct.len(),
        inverted = set.inverted.len(),
        indirect = set.indirect.len(),
        "Classified pairs against {}",
        reference
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<PairRecord> {
        vec![
            PairRecord::new("BTC/USDT", "BTC", "USDT"),
            PairRecord::new("USDT/ARS", "USDT", "ARS"),
            PairRecord::new("LINK/ETH", "LINK", "ETH"),
            PairRecord::new("ETH/USDT", "ETH", "USDT"),
            PairRecord::new("USDT/TRY", "USDT", "TRY"),
            PairRecord::new("ETH/BTC", "ETH", "BTC"),
        ]
    }

    #[test]
    fn test_classify_buckets_and_order() {
        let set = classify(&pairs(), "USDT").unwrap();

        let symbols = |v: &[PairRecord]| v.iter().map(|p| p.symbol.clone()).collect::<Vec<_>>();
        assert_eq!(symbols(&set.direct[..]), vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(symbols(&set.inverted[..]), vec!["USDT/ARS", "USDT/TRY"]);
        assert_eq!(symbols(&set.indirect[..]), vec!["LINK/ETH", "ETH/BTC"]);
    }

    #[test]
    fn test_classify_partitions_input_exactly() {
        let input = pairs();
        let set = classify(&input, "USDT").unwrap();
        assert_eq!(set.len(), input.len());

        for pair in &input {
            let hits = [&set.direct, &set.inverted, &set.indirect]
                .iter()
                .filter(|bucket| bucket.contains(pair))
                .count();
            assert_eq!(hits, 1, "{} must be in exactly one bucket", pair.symbol);
        }
    }

    #[test]
    fn test_classify_empty_input() {
        let set = classify(&[], "USDT").unwrap();
        assert!(set.is_empty());
        assert_eq!(set, ClassifiedPairSet::default());
    }

    #[test]
    fn test_classify_rejects_reference_on_both_legs() {
        let mut input = pairs();
        input.push(PairRecord::new("USDT/USDT", "USDT", "USDT"));
        let err = classify(&input, "USDT").unwrap_err();
        assert!(matches!(err, RefineryError::InvalidPair { ref symbol, .. } if symbol == "USDT/USDT"));
    }

    #[test]
    fn test_classify_other_reference() {
        // Same pairs against BTC: ETH/BTC becomes Direct, BTC/USDT Inverted
        let set = classify(&pairs(), "BTC").unwrap();
        assert_eq!(set.direct.len(), 1);
        assert_eq!(set.direct[0].symbol, "ETH/BTC");
        assert_eq!(set.inverted.len(), 1);
        assert_eq!(set.inverted[0].symbol, "BTC/USDT");
        assert_eq!(set.indirect.len(), 4);
    }

    #[test]
    fn test_classify_does_not_normalize_case() {
        let input = vec![PairRecord::new("btc/usdt", "btc", "usdt")];
        let set = classify(&input, "USDT").unwrap();
        assert_eq!(set.indirect.len(), 1);
    }
}

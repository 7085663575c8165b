//! Pipeline - classify, compute direct, route indirect, unify
//!
//! Stages run strictly in sequence; each one consumes the previous
//! stage's complete output. Nothing here touches the filesystem except
//! [`write_outputs`].

use crate::classifier::classify;
use crate::config::RefineryConfig;
use crate::csv_io::{self, OutputPaths};
use crate::direct::{DirectOutcome, compute_direct};
use crate::error::RefineryError;
use crate::models::{ClassifiedPairSet, CoverageReport, PairRecord};
use crate::router::{EquivalenceMap, RoutingOutcome, route_indirect};
use crate::ticker::TickerSnapshot;
use crate::unifier::{CanonicalTable, UnificationSummary, unify};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RefineryRun {
    pub reference_currency: String,
    pub classified: ClassifiedPairSet,
    pub direct: DirectOutcome,
    pub routing: RoutingOutcome,
    pub table: CanonicalTable,
    /// Coverage fell under `coverage_warn_percent`
    pub low_coverage: bool,
}

/// Per-bucket counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub pairs: usize,
    pub direct_pairs: usize,
    pub inverted_pairs: usize,
    pub indirect_pairs: usize,
    pub direct_entries: usize,
    pub skipped_direct: usize,
    pub superseded_direct: usize,
    pub derived_entries: usize,
    pub unrouted_indirect: usize,
}

/// Serialized as `coverage_<REF>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub reference: String,
    pub counts: RunCounts,
    pub coverage: CoverageReport,
    pub low_coverage: bool,
    pub unification: UnificationSummary,
}

impl RefineryRun {
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            pairs: self.classified.len(),
            direct_pairs: self.classified.direct.len(),
            inverted_pairs: self.classified.inverted.len(),
            indirect_pairs: self.classified.indirect.len(),
            direct_entries: self.direct.entries.len(),
            skipped_direct: self.direct.skipped.len(),
            superseded_direct: self.direct.superseded,
            derived_entries: self.routing.routed.len(),
            unrouted_indirect: self.routing.unrouted.len(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            generated_at: Utc::now(),
            reference: self.reference_currency.clone(),
            counts: self.counts(),
            coverage: self.routing.report.clone(),
            low_coverage: self.low_coverage,
            unification: self.table.summary(),
        }
    }
}

/// Run every stage over an in-memory pair table and ticker snapshot.
///
/// Per-pair problems never fail the run; they end up in the skipped and
/// unrouted lists. Empty inputs and structurally invalid pairs do.
pub fn run_refinery(
    pairs: &[PairRecord],
    snapshot: &TickerSnapshot,
    config: &RefineryConfig,
) -> Result<RefineryRun, RefineryError> {
    config.validate()?;
    if pairs.is_empty() {
        return Err(RefineryError::EmptyInput("pair table"));
    }
    // Entries without a usable price do not count
    if snapshot.priced_len() == 0 {
        tracing::error!(
            entries = snapshot.len(),
            "Ticker snapshot has no usable price"
        );
        return Err(RefineryError::EmptyInput("ticker snapshot"));
    }

    let reference = config.reference_currency.as_str();
    let policy = &config.precision;

    // Stage 1: topology
    let classified = classify(pairs, reference)?;

    // Stage 2: direct equivalences
    let direct = compute_direct(
        &classified.direct,
        &classified.inverted,
        snapshot,
        policy,
        config.tie_break,
    );

    // Stage 3: one-hop routing against a frozen map of stage 2
    let known = EquivalenceMap::from_entries(&direct.entries);
    let routing = route_indirect(&classified.indirect, &known, snapshot, policy);

    let low_coverage = routing.report.is_below(config.coverage_warn_percent);
    if low_coverage {
        tracing::warn!(
            threshold = config.coverage_warn_percent,
            "Low indirect coverage: {}",
            routing.report
        );
    }

    // Stage 4: canonical table
    let table = unify(&direct.entries, &routing.routed, config.dedup_key);

    if direct.entries.is_empty() {
        tracing::warn!(
            reference,
            "No direct equivalences produced; every pair was skipped"
        );
    }

    Ok(RefineryRun {
        reference_currency: reference.to_string(),
        classified,
        direct,
        routing,
        table,
        low_coverage,
    })
}

/// Write every artifact of `run` under `paths`.
pub fn write_outputs(
    run: &RefineryRun,
    paths: &OutputPaths,
    config: &RefineryConfig,
) -> anyhow::Result<()> {
    let policy = &config.precision;
    paths.ensure_dir()?;

    csv_io::write_classified(paths, &run.classified)?;
    csv_io::write_equivalences(paths.direct_equivalences(), &run.direct.entries, policy)?;
    csv_io::write_equivalences(paths.derived_equivalences(), &run.routing.routed, policy)?;
    csv_io::write_rejected(
        paths.skipped_direct(),
        run.direct.skipped.iter().map(|s| (&s.pair, &s.reason)),
    )?;
    csv_io::write_rejected(
        paths.unrouted_indirect(),
        run.routing.unrouted.iter().map(|u| (&u.pair, &u.reason)),
    )?;
    csv_io::write_equivalences(paths.equivalence_table(), run.table.entries(), policy)?;
    csv_io::write_json(paths.coverage(), &run.summary())?;

    tracing::info!("Outputs written to {}", paths.dir().display());
    Ok(())
}

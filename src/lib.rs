//! Quote Refinery - reference-currency equivalence builder
//!
//! Turns a table of trading pairs plus a ticker snapshot into one table
//! stating, for every reachable asset, how many units of the reference
//! currency one unit of the asset is worth (and the reciprocal).
//!
//! # Modules
//!
//! - [`core_types`] - Symbol / asset code aliases
//! - [`error`] - Fatal errors and per-pair skip reasons
//! - [`precision`] - Decimal policy, parsing and fixed-scale rendering
//! - [`models`] - Pairs, equivalence entries, coverage
//! - [`ticker`] - Ticker snapshot and price extraction
//! - [`classifier`] - Direct / Inverted / Indirect topology
//! - [`direct`] - Equivalences from pairs that touch the reference
//! - [`router`] - One-hop routing of Indirect pairs
//! - [`unifier`] - Merge with Direct-over-Derived precedence
//! - [`pipeline`] - Stage orchestration
//! - [`csv_io`] - CSV/JSON loading and saving
//! - [`config`] / [`logging`] - Ambient setup for the binary

// Core types - must be first!
pub mod core_types;

pub mod error;
pub mod precision;

// Domain
pub mod classifier;
pub mod direct;
pub mod models;
pub mod router;
pub mod ticker;
pub mod unifier;

// Orchestration and I/O
pub mod config;
pub mod csv_io;
pub mod logging;
pub mod pipeline;

// Convenient re-exports at crate root
pub use classifier::{Topology, classify, topology_of};
pub use config::{AppConfig, RefineryConfig};
pub use core_types::{AssetCode, Symbol};
pub use direct::{DirectOutcome, TieBreak, compute_direct};
pub use error::{RefineryError, SkipReason};
pub use models::{
    ClassifiedPairSet, CoverageReport, EquivalenceEntry, PairRecord, Provenance, SkippedPair,
    UnroutedPair,
};
pub use pipeline::{RefineryRun, RunSummary, run_refinery, write_outputs};
pub use precision::{PrecisionError, PrecisionPolicy};
pub use router::{EquivalenceMap, RoutingOutcome, route_indirect};
pub use ticker::TickerSnapshot;
pub use unifier::{CanonicalTable, DedupKey, UnificationSummary, unify};

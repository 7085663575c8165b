//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Exchange symbol of a tradable pair, e.g. `BTC/USDT`.
///
/// # Constraints:
/// - **Unique**: identifies exactly one pair within a run
/// - **Normalized**: trimmed and upper-cased by the loader
pub type Symbol = String;

/// Asset code, e.g. `BTC`, `USDT`, `ARS`.
///
/// Also used for the reference currency; there is no separate type for it
/// because any asset can be chosen as the settlement unit.
pub type AssetCode = String;

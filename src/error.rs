//! Error taxonomy
//!
//! Two levels, never mixed:
//! - [`RefineryError`] aborts the run (structural problems, empty inputs).
//! - [`SkipReason`] is attached to a single pair and routed into the
//!   skipped / unrouted outputs; the batch continues.

use crate::core_types::Symbol;
use thiserror::Error;

/// Fatal errors. Any of these halts the run.
#[derive(Debug, Error)]
pub enum RefineryError {
    #[error("Invalid pair {symbol}: {reason}")]
    InvalidPair { symbol: Symbol, reason: String },

    #[error("Empty input: {0} has no records, nothing to process")]
    EmptyInput(&'static str),

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: String, column: String },

    #[error("Invalid value '{value}' for {column} at line {line} in {path}")]
    InvalidValue {
        path: String,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single pair produced no equivalence entry.
///
/// The `Display` text is what lands in the `reason` column of the
/// skipped / unrouted tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("no ticker for symbol")]
    MissingTicker,

    #[error("ticker has no price field")]
    NoPrice,

    #[error("unparsable price '{0}'")]
    UnparsablePrice(String),

    #[error("non-positive price {0}")]
    NonPositivePrice(String),

    #[error("quote {0} has no known equivalence")]
    UnknownQuote(String),

    #[error("arithmetic fault: {0}")]
    Arithmetic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display_is_tabular() {
        // Reasons go into a CSV column, so no line breaks and no commas
        let reasons = [
            SkipReason::MissingField("quote"),
            SkipReason::MissingTicker,
            SkipReason::NoPrice,
            SkipReason::UnparsablePrice("abc".into()),
            SkipReason::NonPositivePrice("0".into()),
            SkipReason::UnknownQuote("XYZ".into()),
            SkipReason::Arithmetic("division by zero".into()),
        ];
        for reason in reasons {
            let text = reason.to_string();
            assert!(!text.contains('\n'), "{text}");
            assert!(!text.contains(','), "{text}");
        }
    }

    #[test]
    fn test_missing_column_names_file_and_column() {
        let err = RefineryError::MissingColumn {
            path: "out/derived.csv".into(),
            column: "units_of_reference_per_asset".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/derived.csv"));
        assert!(msg.contains("units_of_reference_per_asset"));
    }
}

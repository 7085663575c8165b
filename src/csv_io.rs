//! CSV I/O - Load inputs and write every flat output of a run
//!
//! Column layouts here are a contract with downstream consumers; their
//! order never changes. Headers are written even for empty tables.

use crate::error::{RefineryError, SkipReason};
use crate::models::{ClassifiedPairSet, EquivalenceEntry, PairRecord, Provenance};
use crate::precision::{PrecisionPolicy, parse_price};
use crate::ticker::TickerSnapshot;
use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================
// Column layouts
// ============================================================

pub const PAIR_COLUMNS: [&str; 3] = ["symbol", "base", "quote"];

pub const REJECTED_PAIR_COLUMNS: [&str; 4] = ["symbol", "base", "quote", "reason"];

pub const EQUIVALENCE_COLUMNS: [&str; 8] = [
    "asset",
    "symbol",
    "base",
    "quote",
    "units_of_reference_per_asset",
    "units_of_asset_per_reference",
    "is_derived",
    "source",
];

/// One row of an equivalence table. Field order matches [`EQUIVALENCE_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceRow {
    pub asset: String,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub units_of_reference_per_asset: String,
    pub units_of_asset_per_reference: String,
    pub is_derived: bool,
    pub source: String,
}

impl EquivalenceRow {
    pub fn from_entry(entry: &EquivalenceEntry, policy: &PrecisionPolicy) -> Self {
        EquivalenceRow {
            asset: entry.asset.clone(),
            symbol: entry.source_symbol.clone(),
            base: entry.base.clone(),
            quote: entry.quote.clone(),
            units_of_reference_per_asset: policy
                .render_reference_per_asset(&entry.units_of_reference_per_asset),
            units_of_asset_per_reference: policy
                .render_asset_per_reference(&entry.units_of_asset_per_reference),
            is_derived: entry.is_derived(),
            source: entry.provenance.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectedPairRow<'a> {
    symbol: &'a str,
    base: &'a str,
    quote: &'a str,
    reason: String,
}

// ============================================================
// Output file layout
// ============================================================

/// File names of one run, all under `dir`, suffixed with the reference code.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
    reference: String,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>, reference: &str) -> Self {
        OutputPaths {
            dir: dir.into(),
            reference: reference.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, stem: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.{}", stem, self.reference, ext))
    }

    pub fn direct_pairs(&self) -> PathBuf {
        self.file("direct", "csv")
    }

    pub fn inverted_pairs(&self) -> PathBuf {
        self.file("inverted", "csv")
    }

    pub fn indirect_pairs(&self) -> PathBuf {
        self.file("indirect", "csv")
    }

    pub fn direct_equivalences(&self) -> PathBuf {
        self.file("direct_equivalences", "csv")
    }

    pub fn derived_equivalences(&self) -> PathBuf {
        self.file("derived_equivalences", "csv")
    }

    pub fn skipped_direct(&self) -> PathBuf {
        self.file("skipped_direct", "csv")
    }

    pub fn unrouted_indirect(&self) -> PathBuf {
        self.file("unrouted_indirect", "csv")
    }

    pub fn equivalence_table(&self) -> PathBuf {
        self.file("equivalence_table", "csv")
    }

    pub fn coverage(&self) -> PathBuf {
        self.file("coverage", "json")
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| {
            RefineryError::Io {
                path: self.dir.display().to_string(),
                source,
            }
            .into()
        })
    }
}

// ============================================================
// Input Loading
// ============================================================

fn require_columns(path: &Path, headers: &csv::StringRecord, required: &[&str]) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(RefineryError::MissingColumn {
                path: path.display().to_string(),
                column: column.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

/// Load the filtered pair table, trimming and upper-casing each leg.
///
/// Extra columns are ignored. A missing `symbol`/`base`/`quote` header is
/// a structural error.
pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<PairRecord>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    require_columns(path, &headers, &PAIR_COLUMNS)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        let row: PairRecord = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Malformed pair row in {}", path.display()))?;
        pairs.push(PairRecord {
            symbol: row.symbol.trim().to_uppercase(),
            base: row.base.trim().to_uppercase(),
            quote: row.quote.trim().to_uppercase(),
        });
    }

    tracing::info!("Loaded {} pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

/// Load a ticker snapshot (`symbol -> ticker` JSON object).
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<TickerSnapshot> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let snapshot = TickerSnapshot::from_json_str(&content)
        .map_err(RefineryError::from)
        .with_context(|| format!("Invalid ticker snapshot {}", path.display()))?;
    tracing::info!("Loaded {} tickers from {}", snapshot.len(), path.display());
    Ok(snapshot)
}

fn parse_unit(path: &Path, line: u64, column: &'static str, raw: &str) -> Result<BigDecimal> {
    let invalid = || RefineryError::InvalidValue {
        path: path.display().to_string(),
        line,
        column,
        value: raw.to_string(),
    };
    parse_price(raw).map_err(|_| invalid().into())
}

/// Re-read an equivalence table written by an earlier run.
///
/// Every column of [`EQUIVALENCE_COLUMNS`] must be present; provenance is
/// taken from `is_derived`.
pub fn load_equivalences(path: impl AsRef<Path>) -> Result<Vec<EquivalenceEntry>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    require_columns(path, &headers, &EQUIVALENCE_COLUMNS)?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: EquivalenceRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Malformed equivalence row at line {} in {}", line, path.display()))?;

        let reference_per_asset = parse_unit(
            path,
            line,
            "units_of_reference_per_asset",
            &row.units_of_reference_per_asset,
        )?;
        let asset_per_reference = parse_unit(
            path,
            line,
            "units_of_asset_per_reference",
            &row.units_of_asset_per_reference,
        )?;

        entries.push(EquivalenceEntry {
            asset: row.asset,
            units_of_asset_per_reference: asset_per_reference,
            units_of_reference_per_asset: reference_per_asset,
            provenance: if row.is_derived {
                Provenance::Derived
            } else {
                Provenance::Direct
            },
            source_symbol: row.symbol,
            base: row.base,
            quote: row.quote,
        });
    }

    tracing::info!("Loaded {} equivalences from {}", entries.len(), path.display());
    Ok(entries)
}

// ============================================================
// Output Functions
// ============================================================

fn create_writer(path: &Path, columns: &[&str]) -> Result<csv::Writer<fs::File>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(columns)
        .with_context(|| format!("Failed to write header of {}", path.display()))?;
    Ok(writer)
}

fn finish(mut writer: csv::Writer<fs::File>, path: &Path, rows: usize) -> Result<()> {
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    tracing::debug!("Wrote {} rows to {}", rows, path.display());
    Ok(())
}

/// Write `symbol,base,quote` rows.
pub fn write_pairs(path: impl AsRef<Path>, pairs: &[PairRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = create_writer(path, &PAIR_COLUMNS)?;
    for pair in pairs {
        writer.serialize(pair).map_err(RefineryError::from)?;
    }
    finish(writer, path, pairs.len())
}

/// Write `symbol,base,quote,reason` rows for pairs that produced nothing.
pub fn write_rejected<'a>(
    path: impl AsRef<Path>,
    rows: impl IntoIterator<Item = (&'a PairRecord, &'a SkipReason)>,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = create_writer(path, &REJECTED_PAIR_COLUMNS)?;
    let mut count = 0;
    for (pair, reason) in rows {
        writer
            .serialize(RejectedPairRow {
                symbol: &pair.symbol,
                base: &pair.base,
                quote: &pair.quote,
                reason: reason.to_string(),
            })
            .map_err(RefineryError::from)?;
        count += 1;
    }
    finish(writer, path, count)
}

/// Write equivalence rows at the policy's output scales.
pub fn write_equivalences<'a>(
    path: impl AsRef<Path>,
    entries: impl IntoIterator<Item = &'a EquivalenceEntry>,
    policy: &PrecisionPolicy,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = create_writer(path, &EQUIVALENCE_COLUMNS)?;
    let mut count = 0;
    for entry in entries {
        writer
            .serialize(EquivalenceRow::from_entry(entry, policy))
            .map_err(RefineryError::from)?;
        count += 1;
    }
    finish(writer, path, count)
}

/// Write the three classification buckets.
pub fn write_classified(paths: &OutputPaths, set: &ClassifiedPairSet) -> Result<()> {
    write_pairs(paths.direct_pairs(), &set.direct)?;
    write_pairs(paths.inverted_pairs(), &set.inverted)?;
    write_pairs(paths.indirect_pairs(), &set.indirect)?;
    Ok(())
}

/// Pretty JSON, trailing newline.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut body = serde_json::to_string_pretty(value).map_err(RefineryError::from)?;
    body.push('\n');
    fs::write(path, body).map_err(|source| {
        RefineryError::Io {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}

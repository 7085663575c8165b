use std::fs;
use std::path::Path;

use bigdecimal::BigDecimal;
use quote_refinery::csv_io::{self, EQUIVALENCE_COLUMNS, OutputPaths};
use quote_refinery::{
    DedupKey, PairRecord, Provenance, RefineryConfig, RefineryError, TickerSnapshot,
    run_refinery, unify, write_outputs,
};
use std::str::FromStr;
use tempfile::tempdir;

const PAIRS_CSV: &str = "symbol,base,quote
BTC/USDT,BTC,USDT
ETH/USDT,ETH,USDT
USDT/ARS,USDT,ARS
ETH/BTC,ETH,BTC
LINK/ETH,LINK,ETH
AAVE/ETH,AAVE,ETH
DOGE/XYZ,DOGE,XYZ
ADA/USDT,ADA,USDT
";

const TICKERS_JSON: &str = r#"{
  "BTC/USDT": {"last": "50000"},
  "ETH/USDT": {"last": 3000},
  "USDT/ARS": {"last": null, "close": "1000"},
  "ETH/BTC": {"last": "0.06"},
  "LINK/ETH": {"last": "0.005"},
  "AAVE/ETH": {"info": {"lastPrice": "0.03"}},
  "DOGE/XYZ": {"last": "1"},
  "ADA/USDT": {"last": "0"}
}"#;

/// Write the two input files into `dir`.
fn seed_inputs(dir: &Path) {
    fs::write(dir.join("pairs.csv"), PAIRS_CSV).unwrap();
    fs::write(dir.join("tickers.json"), TICKERS_JSON).unwrap();
}

fn run_into(input: &Path, out: &Path, config: &RefineryConfig) -> OutputPaths {
    let pairs = csv_io::load_pairs(input.join("pairs.csv")).unwrap();
    let snapshot = csv_io::load_snapshot(input.join("tickers.json")).unwrap();
    let run = run_refinery(&pairs, &snapshot, config).unwrap();
    let paths = OutputPaths::new(out, &config.reference_currency);
    write_outputs(&run, &paths, config).unwrap();
    paths
}

#[test]
fn full_run_writes_every_output() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let config = RefineryConfig::default();
    let paths = run_into(dir.path(), &dir.path().join("out"), &config);

    for file in [
        paths.direct_pairs(),
        paths.inverted_pairs(),
        paths.indirect_pairs(),
        paths.direct_equivalences(),
        paths.derived_equivalences(),
        paths.skipped_direct(),
        paths.unrouted_indirect(),
        paths.equivalence_table(),
        paths.coverage(),
    ] {
        assert!(file.exists(), "missing output {}", file.display());
    }

    let table = fs::read_to_string(paths.equivalence_table()).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], EQUIVALENCE_COLUMNS.join(","));
    assert!(lines.contains(&"BTC,BTC/USDT,BTC,USDT,50000.0000000000,0.000020000000000000,false,direct"));
    assert!(lines.contains(&"ARS,USDT/ARS,USDT,ARS,0.0010000000,1000.000000000000000000,false,direct"));
    assert!(lines.contains(&"LINK,LINK/ETH,LINK,ETH,600000.0000000000,0.000001666666666667,true,derived"));
    // AAVE priced through info.lastPrice
    assert!(lines.iter().any(|l| l.starts_with("AAVE,AAVE/ETH,AAVE,ETH,100000.0000000000,")));

    let skipped = fs::read_to_string(paths.skipped_direct()).unwrap();
    assert!(skipped.contains("ADA/USDT,ADA,USDT,non-positive price 0"));

    let coverage: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.coverage()).unwrap()).unwrap();
    assert_eq!(coverage["reference"], "USDT");
    assert_eq!(coverage["coverage"]["total_indirect"], 4);
    assert_eq!(coverage["coverage"]["routed"], 3);
    assert_eq!(coverage["counts"]["skipped_direct"], 1);
    assert_eq!(coverage["low_coverage"], false);
}

#[test]
fn unrouted_pair_is_reported_and_absent_from_table() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let paths = run_into(dir.path(), &dir.path().join("out"), &RefineryConfig::default());

    let unrouted = fs::read_to_string(paths.unrouted_indirect()).unwrap();
    assert!(unrouted.contains("DOGE/XYZ,DOGE,XYZ,quote XYZ has no known equivalence"));

    let table = fs::read_to_string(paths.equivalence_table()).unwrap();
    assert!(!table.contains("DOGE"), "unrouted asset leaked into table");
}

#[test]
fn direct_entry_beats_derived_for_same_asset() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let paths = run_into(dir.path(), &dir.path().join("out"), &RefineryConfig::default());

    // ETH is priced both by ETH/USDT (direct) and ETH/BTC (derived)
    let derived = fs::read_to_string(paths.derived_equivalences()).unwrap();
    assert!(derived.contains("ETH,ETH/BTC,ETH,BTC,833333.3333333333"));

    let table = csv_io::load_equivalences(paths.equivalence_table()).unwrap();
    let eth: Vec<_> = table.iter().filter(|e| e.asset == "ETH").collect();
    assert_eq!(eth.len(), 1);
    assert_eq!(eth[0].provenance, Provenance::Direct);
    assert_eq!(eth[0].source_symbol, "ETH/USDT");
}

#[test]
fn rerun_is_byte_identical() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let config = RefineryConfig::default();
    let first = run_into(dir.path(), &dir.path().join("run1"), &config);
    let second = run_into(dir.path(), &dir.path().join("run2"), &config);

    let a = fs::read(first.equivalence_table()).unwrap();
    let b = fs::read(second.equivalence_table()).unwrap();
    assert_eq!(a, b, "canonical table differs between identical runs");
}

#[test]
fn reciprocal_holds_for_every_row() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let paths = run_into(dir.path(), &dir.path().join("out"), &RefineryConfig::default());

    let tolerance = BigDecimal::from_str("0.00000001").unwrap();
    let one = BigDecimal::from(1);
    for entry in csv_io::load_equivalences(paths.equivalence_table()).unwrap() {
        let product = &entry.units_of_asset_per_reference * &entry.units_of_reference_per_asset;
        let error = (product - &one).abs();
        assert!(error < tolerance, "{} product off by {}", entry.asset, error);
    }
}

#[test]
fn empty_pair_table_is_fatal() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("pairs.csv"), "symbol,base,quote\n").unwrap();
    let pairs = csv_io::load_pairs(dir.path().join("pairs.csv")).unwrap();
    assert!(pairs.is_empty());

    let snapshot = TickerSnapshot::from_last_prices([("BTC/USDT", "50000")]);
    let err = run_refinery(&pairs, &snapshot, &RefineryConfig::default()).unwrap_err();
    assert!(matches!(err, RefineryError::EmptyInput("pair table")));
}

#[test]
fn empty_snapshot_is_fatal() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    fs::write(dir.path().join("tickers.json"), "{}").unwrap();
    let pairs = csv_io::load_pairs(dir.path().join("pairs.csv")).unwrap();
    let snapshot = csv_io::load_snapshot(dir.path().join("tickers.json")).unwrap();

    let err = run_refinery(&pairs, &snapshot, &RefineryConfig::default()).unwrap_err();
    assert!(matches!(err, RefineryError::EmptyInput("ticker snapshot")));
}

#[test]
fn unify_rejects_table_missing_column() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("derived.csv");
    fs::write(
        &path,
        "asset,symbol,base,quote,units_of_reference_per_asset\nLINK,LINK/ETH,LINK,ETH,15\n",
    )
    .unwrap();

    let err = csv_io::load_equivalences(&path).unwrap_err();
    match err.downcast_ref::<RefineryError>() {
        Some(RefineryError::MissingColumn { column, .. }) => {
            assert_eq!(column, "units_of_asset_per_reference")
        }
        other => panic!("expected MissingColumn, got {:?}", other),
    }
}

#[test]
fn unify_from_files_matches_pipeline_table() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let paths = run_into(dir.path(), &dir.path().join("out"), &RefineryConfig::default());

    let direct = csv_io::load_equivalences(paths.direct_equivalences()).unwrap();
    let derived = csv_io::load_equivalences(paths.derived_equivalences()).unwrap();
    let table = unify(&direct, &derived, DedupKey::Asset);

    let merged = dir.path().join("merged.csv");
    csv_io::write_equivalences(&merged, table.entries(), &Default::default()).unwrap();
    assert_eq!(
        fs::read_to_string(merged).unwrap(),
        fs::read_to_string(paths.equivalence_table()).unwrap()
    );
}

#[test]
fn other_reference_currency_runs_side_by_side() {
    let pairs = vec![
        PairRecord::new("ETH/BTC", "ETH", "BTC"),
        PairRecord::new("LINK/ETH", "LINK", "ETH"),
        PairRecord::new("BTC/USDT", "BTC", "USDT"),
    ];
    let snapshot = TickerSnapshot::from_last_prices([
        ("ETH/BTC", "0.05"),
        ("LINK/ETH", "0.01"),
        ("BTC/USDT", "50000"),
    ]);

    let btc = run_refinery(&pairs, &snapshot, &RefineryConfig::with_reference("BTC")).unwrap();
    let usdt = run_refinery(&pairs, &snapshot, &RefineryConfig::default()).unwrap();

    assert_eq!(btc.classified.direct.len(), 1);
    assert_eq!(btc.classified.inverted.len(), 1);
    assert_eq!(
        btc.table.get("ETH").unwrap().units_of_reference_per_asset,
        BigDecimal::from_str("0.05").unwrap()
    );
    assert_eq!(
        btc.table.get("LINK").unwrap().units_of_reference_per_asset,
        BigDecimal::from_str("5").unwrap()
    );
    assert_eq!(usdt.classified.indirect.len(), 2);
}

#[test]
fn malformed_ticker_entry_only_loses_its_own_pair() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let tickers = TICKERS_JSON.replace(r#""DOGE/XYZ": {"last": "1"}"#, r#""DOGE/XYZ": null"#);
    fs::write(dir.path().join("tickers.json"), tickers).unwrap();

    let paths = run_into(dir.path(), &dir.path().join("out"), &RefineryConfig::default());
    let table = fs::read_to_string(paths.equivalence_table()).unwrap();
    assert!(table.contains("BTC,BTC/USDT,BTC,USDT,50000.0000000000"));
    let unrouted = fs::read_to_string(paths.unrouted_indirect()).unwrap();
    assert!(unrouted.contains("DOGE/XYZ,DOGE,XYZ,"));
}

#[test]
fn snapshot_of_unusable_prices_is_fatal() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    fs::write(
        dir.path().join("tickers.json"),
        r#"{"BTC/USDT": {"last": null}, "LINK/ETH": null}"#,
    )
    .unwrap();
    let pairs = csv_io::load_pairs(dir.path().join("pairs.csv")).unwrap();
    let snapshot = csv_io::load_snapshot(dir.path().join("tickers.json")).unwrap();

    let err = run_refinery(&pairs, &snapshot, &RefineryConfig::default()).unwrap_err();
    assert!(matches!(err, RefineryError::EmptyInput("ticker snapshot")));
}

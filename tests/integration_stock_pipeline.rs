//! Integration tests for the stock pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end stock computation: from a raw country-year
//!   panel, through expansion, identity resolution, normalization and
//!   filling, antecedent resolution, and accumulation, to the assembled
//!   output table.
//! - Check exact recurrence values on small panels and structural
//!   properties (bounds, row retention, determinism) on larger synthetic
//!   panels.
//!
//! Coverage
//! --------
//! - `stock::pipeline`:
//!   - `compute_stock` and `StockPipeline::run` with the builtin and with
//!     caller-supplied identity tables.
//! - `stock::core`:
//!   - Predecessor group means over the expanded, identity-resolved panel.
//!   - Forward-fill horizon as seen through the stock recurrence.
//! - `stock::output`:
//!   - Column naming, extra variables, row trimming, and the report.
//!
//! Exclusions
//! ----------
//! - Fine-grained validation of individual stages (fill runs, override
//!   kinds, rule precedence); these are covered by unit tests.
//! - Python bindings, which need an interpreter.
use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use stock_index::stock::{
    core::{
        antecedent::resolve_antecedent,
        expand::expand_panel,
        identity::IdentityTable,
        normalize::normalize_and_fill,
        options::{Fill, StockOptions},
        panel::{Column, RawPanel},
    },
    errors::StockWarning,
    output::StockTable,
    pipeline::{StockPipeline, compute_stock},
};

const W: f64 = 0.99;

/// Install a test-writer `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; repeated calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Purpose
/// -------
/// Build a [`RawPanel`] with a single numeric indicator from row tuples.
///
/// Parameters
/// ----------
/// - `variable`: indicator column name.
/// - `rows`: `(country_id, country_name, year, value)`; `None` is missing.
///
/// Invariants
/// ----------
/// - Panics on ragged input; this is a test-time construction error.
fn panel_from(variable: &str, rows: &[(i64, &str, i32, Option<f64>)]) -> RawPanel {
    RawPanel::new(
        rows.iter().map(|r| r.0).collect(),
        rows.iter().map(|r| r.1.to_string()).collect(),
        rows.iter().map(|r| r.2).collect(),
    )
    .expect("key columns have equal length")
    .with_numeric(variable, rows.iter().map(|r| r.3).collect())
    .expect("indicator column matches key length")
}

/// Purpose
/// -------
/// Build a deterministic, high-cardinality panel of `countries` × `years`
/// rows with roughly one value in seven missing.
///
/// Values are drawn from a seeded `SmallRng`, so every run sees the same
/// panel. Country ids start at 901 (outside the builtin identity table).
fn synthetic_panel(variable: &str, countries: i64, years: i32) -> RawPanel {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut rows = Vec::new();
    for c in 0..countries {
        for y in 0..years {
            let value =
                if rng.gen_bool(1.0 / 7.0) { None } else { Some(rng.gen_range(0.0..10.0)) };
            rows.push((901 + c, "Synthetic", 1900 + y, value));
        }
    }
    panel_from(variable, &rows)
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!((actual - expected).abs() < 1e-12, "{what}: got {actual}, expected {expected}");
}

fn stock_at(table: &StockTable, variable: &str, weight: f64, id: i64, year: i32) -> (f64, f64) {
    let row = table.row_of(id, year).expect("row retained");
    let stock = table.stock(variable, weight).expect("stock columns present");
    (stock.raw[row], stock.rescaled[row])
}

#[test]
// Purpose
// -------
// Verify the exact recurrence values for a two-country panel, including a
// one-year gap closed by forward filling.
//
// Given
// -----
// - Countries 901 and 902, years 2000–2003, fill = 1, w = 0.99.
// - 901: [0.2, 0.4, missing, 0.8]; 902: [0.0, 1.0, 0.3, 0.6].
// - Panel min 0 and max 1, so normalized values equal the raw values.
//
// Expect
// ------
// - 901 stock_raw: [NaN, 0.2, 0.99·0.2 + 0.4, 0.99·0.598 + 0.4].
// - 902 stock_raw: [NaN, 0.0, 1.0, 0.99·1.0 + 0.3].
// - Rescaled = raw · 0.01; all rows retained; column names use ".99".
// - One low-cardinality warning (7 distinct values).
fn two_country_panel_matches_recurrence_exactly() {
    init_tracing();
    let raw = panel_from(
        "v2x_polyarchy",
        &[
            (901, "Atlantis", 2000, Some(0.2)),
            (901, "Atlantis", 2001, Some(0.4)),
            (901, "Atlantis", 2002, None),
            (901, "Atlantis", 2003, Some(0.8)),
            (902, "Borduria", 2000, Some(0.0)),
            (902, "Borduria", 2001, Some(1.0)),
            (902, "Borduria", 2002, Some(0.3)),
            (902, "Borduria", 2003, Some(0.6)),
        ],
    );
    let options = StockOptions::default().with_fill(Fill::new(1).unwrap());

    let table = StockPipeline::new().unwrap().run(&raw, &options).unwrap();

    assert_eq!(table.len(), 8);
    assert_eq!(
        table.column_names(),
        [
            "country_name",
            "country_id_hist",
            "country_id",
            "year",
            "v2x_polyarchy.99_raw",
            "v2x_polyarchy.99"
        ]
    );

    let expected_901 = [f64::NAN, 0.2, W * 0.2 + 0.4, W * (W * 0.2 + 0.4) + 0.4];
    let expected_902 = [f64::NAN, 0.0, 1.0, W * 1.0 + 0.3];
    for (id, expected) in [(901, expected_901), (902, expected_902)] {
        for (offset, e) in expected.iter().enumerate() {
            let year = 2000 + offset as i32;
            let (raw, rescaled) = stock_at(&table, "v2x_polyarchy", W, id, year);
            if e.is_nan() {
                assert!(raw.is_nan() && rescaled.is_nan(), "{id}/{year}: seed must be missing");
            } else {
                assert_close(raw, *e, &format!("{id}/{year} raw"));
                assert_close(rescaled, e * (1.0 - W), &format!("{id}/{year} rescaled"));
            }
        }
    }

    assert_eq!(
        table.report.warnings,
        vec![StockWarning::LowCardinality { variable: "v2x_polyarchy".into(), distinct: 7 }]
    );
    assert_eq!(table.report.synthesized_rows, 0);
}

/// Identity table for the predecessor scenario: 902 belongs to 901 over
/// 1900–1910 and 903 belongs to 901 over 1900–1905.
fn predecessor_table() -> Arc<IdentityTable> {
    let json = r#"{
        "version": 1,
        "rules": [
            { "country_id": 902, "year_start": 1900, "year_end": 1910, "predecessor_id": 901 },
            { "country_id": 903, "year_start": 1900, "year_end": 1905, "predecessor_id": 901 }
        ],
        "changed": [901]
    }"#;
    Arc::new(IdentityTable::from_json_str(json).expect("valid identity document"))
}

/// Three countries observed 1900–1915:
/// - 901: (y − 1900) / 15, spanning [0, 1];
/// - 902: constant 0.5;
/// - 903: missing through 1905, then 0.25.
fn predecessor_panel() -> RawPanel {
    let mut rows = Vec::new();
    for y in 1900..=1915 {
        rows.push((901, "Empire", y, Some((y - 1900) as f64 / 15.0)));
        rows.push((902, "Successor", y, Some(0.5)));
        rows.push((903, "Late successor", y, if y <= 1905 { None } else { Some(0.25) }));
    }
    panel_from("x", &rows)
}

#[test]
// Purpose
// -------
// Verify that, while a country's historical id differs from its own, its
// antecedent value equals the mean filled value of every country sharing
// that historical id in the same year.
//
// Given
// -----
// - The predecessor table and panel above, fill = 0.
//
// Expect
// ------
// - 902 over 1900–1910: mean(901, 902) = ((y − 1900)/15 + 0.5) / 2, with
//   903's missing 1900–1905 values excluded from the mean.
// - 902 from 1911 and 901 throughout: their own values.
fn predecessor_years_take_group_mean() {
    init_tracing();
    let table = predecessor_table();
    let raw = predecessor_panel();

    let (panel, _) = expand_panel(&raw, &table, &["x".to_string()]).unwrap();
    let panel = table.resolve_panel(panel);
    let (filled, warning) = normalize_and_fill(&panel, "x", Fill::new(0).unwrap()).unwrap();
    let antecedent = resolve_antecedent(&panel, &filled.filled, &table);

    assert!(warning.is_none());
    for y in 1900..=1915 {
        let own_901 = (y - 1900) as f64 / 15.0;
        let row_901 = panel.row_of(901, y).unwrap();
        let row_902 = panel.row_of(902, y).unwrap();
        assert_close(antecedent[row_901], own_901, &format!("901/{y}"));
        let expected_902 = if y <= 1910 { (own_901 + 0.5) / 2.0 } else { 0.5 };
        assert_close(antecedent[row_902], expected_902, &format!("902/{y}"));
    }
}

#[test]
// Purpose
// -------
// Ensure predecessor history seeds a late-observed country's stock while
// the output only keeps years from its first raw observation onward.
//
// Given
// -----
// - The predecessor table and panel, fill = 0, w = 0.99.
// - 903 is first observed in 1906 but inherits 901's history for
//   1900–1905.
//
// Expect
// ------
// - 903's rows before 1906 are dropped; 1906 and later are kept.
// - 903's 1906 stock equals Σ_{t=1900}^{1905} w^{1905−t} · mean_t, where
//   mean_t = ((t − 1900)/15 + 0.5) / 2.
// - `country_id_hist` reports 901 for 902 in 1905 and 902 in 1911.
fn predecessor_history_seeds_stock_before_first_observation() {
    init_tracing();
    let raw = predecessor_panel();
    let options = StockOptions::new(vec!["x".into()], &[W], 0, vec![]).unwrap();

    let table = StockPipeline::with_identity_table(predecessor_table()).run(&raw, &options).unwrap();

    assert!(table.row_of(903, 1905).is_none());
    assert!(table.row_of(903, 1906).is_some());

    let mut expected = 0.0;
    for t in 1900..=1905 {
        let mean = ((t - 1900) as f64 / 15.0 + 0.5) / 2.0;
        expected = W * expected + mean;
    }
    let (raw_1906, _) = stock_at(&table, "x", W, 903, 1906);
    assert_close(raw_1906, expected, "903/1906");

    let hist = |id: i64, year: i32| table.country_id_hist[table.row_of(id, year).unwrap()];
    assert_eq!(hist(902, 1905), 901);
    assert_eq!(hist(902, 1911), 902);
    assert_eq!(hist(903, 1906), 903);
}

#[test]
// Purpose
// -------
// Check that rescaled stocks stay within [0, 1] for every weight on a
// larger, irregular panel.
//
// Given
// -----
// - 6 countries × 80 years of LCG values with ~1/7 missing, fill = 2.
// - Weights 0.5, 0.9, 0.99.
//
// Expect
// ------
// - Every non-missing rescaled value lies in [0, 1].
// - No low-cardinality warning.
fn rescaled_stocks_are_bounded() {
    init_tracing();
    let raw = synthetic_panel("x", 6, 80);

    let table = compute_stock(&raw, &["x".into()], &[0.5, 0.9, 0.99], 2, &[]).unwrap();

    assert_eq!(table.stocks.len(), 3);
    assert!(table.report.warnings.is_empty());
    for stock in &table.stocks {
        for v in stock.rescaled.iter().filter(|v| !v.is_nan()) {
            assert!(
                (0.0..=1.0 + 1e-12).contains(v),
                "{}: rescaled value {v} out of bounds",
                stock.rescaled_name()
            );
        }
    }
}

#[test]
// Purpose
// -------
// Verify runs are bit-for-bit reproducible across repeated runs and rayon
// thread counts.
//
// Given
// -----
// - The synthetic panel, computed on the global pool twice and on a
//   single-threaded pool once.
//
// Expect
// ------
// - Identical keys and identical stock bits (missing values included).
fn runs_are_deterministic_across_thread_counts() {
    init_tracing();
    let raw = synthetic_panel("x", 8, 60);
    let run = || compute_stock(&raw, &["x".into()], &[0.9, 0.99], 3, &[]).unwrap();

    let first = run();
    let second = run();
    let single = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap().install(run);

    let bits = |t: &StockTable| -> Vec<u64> {
        t.stocks
            .iter()
            .flat_map(|s| s.raw.iter().chain(s.rescaled.iter()))
            .map(|v| v.to_bits())
            .collect()
    };
    for other in [&second, &single] {
        assert_eq!(first.country_id, other.country_id);
        assert_eq!(first.year, other.year);
        assert_eq!(bits(&first), bits(other));
    }
}

#[test]
// Purpose
// -------
// Ensure excluded entities are dropped and reported, and a country with no
// raw observation keeps all its rows with missing stocks.
//
// Given
// -----
// - 901 observed 2000–2001; 128 (excluded) observed 2000–2001; 904 present
//   2000–2001 with every value missing.
//
// Expect
// ------
// - No output row for 128; `report.excluded == [(128, "Enclave")]`.
// - 904 keeps both rows; its stocks are missing.
fn excluded_entities_and_unobserved_countries() {
    init_tracing();
    let raw = panel_from(
        "x",
        &[
            (901, "Atlantis", 2000, Some(0.1)),
            (901, "Atlantis", 2001, Some(0.9)),
            (128, "Enclave", 2000, Some(0.5)),
            (128, "Enclave", 2001, Some(0.6)),
            (904, "Nowhere", 2000, None),
            (904, "Nowhere", 2001, None),
        ],
    );

    let table = compute_stock(&raw, &["x".into()], &[0.9], 5, &[]).unwrap();

    assert!(!table.country_id.contains(&128));
    assert_eq!(table.report.excluded, vec![(128, "Enclave".to_string())]);
    for year in [2000, 2001] {
        let (raw, rescaled) = stock_at(&table, "x", 0.9, 904, year);
        assert!(raw.is_nan() && rescaled.is_nan());
    }
}

#[test]
// Purpose
// -------
// Show the forward-fill horizon through the stock: a two-year gap breaks
// the recurrence at fill = 1 and is bridged at fill = 2.
//
// Given
// -----
// - 901, 2000–2004: [0.0, 1.0, missing, missing, 0.5], w = 0.5.
//
// Expect
// ------
// - fill = 1: stock for 2003 and 2004 is missing.
// - fill = 2: 2003 = 0.5·1.0 + 1.0 = 1.5, 2004 = 0.5·1.5 + 1.0 = 1.75.
fn fill_horizon_controls_recurrence_continuity() {
    init_tracing();
    let raw = panel_from(
        "x",
        &[
            (901, "Atlantis", 2000, Some(0.0)),
            (901, "Atlantis", 2001, Some(1.0)),
            (901, "Atlantis", 2002, None),
            (901, "Atlantis", 2003, None),
            (901, "Atlantis", 2004, Some(0.5)),
        ],
    );

    let short = compute_stock(&raw, &["x".into()], &[0.5], 1, &[]).unwrap();
    let long = compute_stock(&raw, &["x".into()], &[0.5], 2, &[]).unwrap();

    assert!(stock_at(&short, "x", 0.5, 901, 2003).0.is_nan());
    assert!(stock_at(&short, "x", 0.5, 901, 2004).0.is_nan());
    assert_close(stock_at(&long, "x", 0.5, 901, 2003).0, 1.5, "2003");
    assert_close(stock_at(&long, "x", 0.5, 901, 2004).0, 1.75, "2004");
}

#[test]
// Purpose
// -------
// Verify options loaded from JSON drive the run and extra variables are
// carried through after year gaps are synthesized.
//
// Given
// -----
// - 901 observed in 2000 and 2002 only (2001 synthesized), with a text
//   column "region" and indicator "x".
// - JSON options: variables ["x"], weights [0.9, 0.5], fill 1,
//   extra_variables ["region"].
//
// Expect
// ------
// - One synthesized row; "region" present with `None` in 2001.
// - Stock columns for both weights, in request order.
fn json_options_and_extra_variables() {
    init_tracing();
    let raw = panel_from(
        "x",
        &[(901, "Atlantis", 2000, Some(0.0)), (901, "Atlantis", 2002, Some(1.0))],
    )
    .with_text("region", vec![Some("North".into()), Some("North".into())])
    .unwrap();
    let options = StockOptions::from_json_str(
        r#"{ "variables": ["x"], "weights": [0.9, 0.5], "fill": 1, "extra_variables": ["region"] }"#,
    )
    .unwrap();

    let table = StockPipeline::new().unwrap().run(&raw, &options).unwrap();

    assert_eq!(table.report.synthesized_rows, 1);
    assert_eq!(
        table.column_names(),
        [
            "country_name",
            "country_id_hist",
            "country_id",
            "year",
            "region",
            "x.9_raw",
            "x.9",
            "x.5_raw",
            "x.5"
        ]
    );
    let region = match table.extra("region") {
        Some(Column::Text(values)) => values.clone(),
        other => panic!("expected text column, got {other:?}"),
    };
    assert_eq!(region, vec![Some("North".into()), None, Some("North".into())]);
}

#[test]
// Purpose
// -------
// Verify row trimming uses the earliest first-observation year across all
// requested indicators, and each indicator's stock stays missing before its
// own first observation.
//
// Given
// -----
// - Country 901, years 2000–2003, w = 0.5, fill = 0.
// - Indicator "a": [0.0, 1.0, 1.0, 1.0]; "b": [missing, missing, 0.0, 1.0].
// - Both indicators span [0, 1], so normalized values equal the raw ones.
//
// Expect
// ------
// - Output years 2000–2003 (trimmed at a's first year, 2000).
// - a.5_raw = [NaN, 0.0, 1.0, 1.5].
// - b.5_raw = [NaN, NaN, NaN, 0.0]: b's seed is 2002 and earlier years are
//   before its own first observation.
fn trimming_uses_earliest_first_observation_across_indicators() {
    init_tracing();
    let years = vec![2000, 2001, 2002, 2003];
    let raw = RawPanel::new(vec![901; 4], vec!["Atlantis".to_string(); 4], years.clone())
        .unwrap()
        .with_numeric("a", vec![Some(0.0), Some(1.0), Some(1.0), Some(1.0)])
        .unwrap()
        .with_numeric("b", vec![None, None, Some(0.0), Some(1.0)])
        .unwrap();

    let table = compute_stock(&raw, &["a".into(), "b".into()], &[0.5], 0, &[]).unwrap();

    assert_eq!(table.year, years);
    let a = &table.stock("a", 0.5).unwrap().raw;
    let b = &table.stock("b", 0.5).unwrap().raw;
    assert!(a[0].is_nan());
    assert_close(a[1], 0.0, "a/2001");
    assert_close(a[2], 1.0, "a/2002");
    assert_close(a[3], 1.5, "a/2003");
    assert!(b[0].is_nan() && b[1].is_nan() && b[2].is_nan());
    assert_close(b[3], 0.0, "b/2003");
}

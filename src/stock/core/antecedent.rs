//! Antecedent resolver — shared predecessor history for pre-independence years.
//!
//! Purpose
//! -------
//! Replace a country's filled indicator for the years it belonged to a
//! predecessor polity by the contemporaneous average of every country
//! sharing that historical identity, then apply the literal overrides for
//! documented colonial gaps and shared-administration periods.
//!
//! Key behaviors
//! -------------
//! - For each `(country_id_hist, year)` whose historical id is in the
//!   table's `changed` set, compute the mean filled value over every row
//!   mapped to that historical id (missing values excluded).
//! - Rows with `country_id_hist != country_id` and a `changed` historical id
//!   take that mean (missing when no row of the group is observed).
//! - Overrides run afterwards, in table order:
//!   `CarryForward` copies the previous year's antecedent value of the same
//!   country year by year; `GroupMean` gives every listed country the mean
//!   antecedent value of the group for each year of the window.
//!
//! Invariants & assumptions
//! ------------------------
//! - Means of values in [0, 1] stay in [0, 1], so antecedent values keep
//!   the normalized bounds.
//! - Group means are accumulated in row order, which keeps results
//!   bit-for-bit reproducible.
use std::collections::BTreeMap;

use ndarray::Array1;
use statrs::statistics::Statistics;

use crate::stock::core::{
    identity::{IdentityTable, LiteralOverride},
    panel::Panel,
};

/// Compute antecedent values for one indicator.
///
/// Parameters
/// ----------
/// - `panel`: identity-resolved panel.
/// - `filled`: forward-filled normalized indicator, row-aligned with `panel`.
/// - `identity`: supplies the `changed` set and the literal overrides.
///
/// Returns
/// -------
/// Row-aligned antecedent values.
pub fn resolve_antecedent(
    panel: &Panel, filled: &Array1<f64>, identity: &IdentityTable,
) -> Array1<f64> {
    let changed = identity.changed();
    let hist = panel.country_id_hist();
    let ids = panel.country_id();
    let years = panel.year();

    let mut groups: BTreeMap<(i64, i32), Vec<f64>> = BTreeMap::new();
    for row in 0..panel.len() {
        if changed.contains(&hist[row]) && !filled[row].is_nan() {
            groups.entry((hist[row], years[row])).or_default().push(filled[row]);
        }
    }
    let means: BTreeMap<(i64, i32), f64> =
        groups.into_iter().map(|(key, values)| (key, Statistics::mean(&values))).collect();

    let mut antecedent = filled.clone();
    let mut replaced = 0usize;
    for row in 0..panel.len() {
        if hist[row] != ids[row] && changed.contains(&hist[row]) {
            antecedent[row] = means.get(&(hist[row], years[row])).copied().unwrap_or(f64::NAN);
            replaced += 1;
        }
    }

    for entry in identity.overrides() {
        apply_override(panel, &mut antecedent, entry);
    }

    tracing::debug!(
        target: "stock_index::antecedent",
        replaced,
        overrides = identity.overrides().len(),
        "antecedent.resolved"
    );
    antecedent
}

// ---- Helper Methods ----

fn apply_override(panel: &Panel, antecedent: &mut Array1<f64>, entry: &LiteralOverride) {
    match entry {
        LiteralOverride::CarryForward { country_id, year_start, year_end, .. } => {
            for year in *year_start..=*year_end {
                if let (Some(row), Some(prev)) =
                    (panel.row_of(*country_id, year), panel.row_of(*country_id, year - 1))
                {
                    antecedent[row] = antecedent[prev];
                }
            }
        }
        LiteralOverride::GroupMean { country_ids, year_start, year_end, .. } => {
            for year in *year_start..=*year_end {
                let rows: Vec<usize> =
                    country_ids.iter().filter_map(|&id| panel.row_of(id, year)).collect();
                let observed: Vec<f64> =
                    rows.iter().map(|&row| antecedent[row]).filter(|v| !v.is_nan()).collect();
                if observed.is_empty() {
                    continue;
                }
                let mean = Statistics::mean(&observed);
                for row in rows {
                    antecedent[row] = mean;
                }
            }
        }
    }
}

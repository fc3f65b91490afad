//! Normalizer & imputer — min-max scaling and bounded forward fill.
//!
//! Purpose
//! -------
//! Bring each requested indicator onto a common [0, 1] scale and close
//! short gaps in each country's series so the antecedent and stock stages
//! see a mostly continuous input.
//!
//! Key behaviors
//! -------------
//! - [`min_max_normalize`] rescales a column so its panel-wide observed
//!   minimum maps to 0 and maximum to 1; missing values stay missing.
//! - [`forward_fill`] replaces a run of missing values by the last observed
//!   value before it when the run is at most `fill` years long; longer runs
//!   stay missing in full. Leading runs have nothing to carry and stay
//!   missing. `fill == 0` disables filling.
//! - [`normalize_and_fill`] validates the column, emits a low-cardinality
//!   warning when appropriate, and fills every country independently.
//!
//! Invariants & assumptions
//! ------------------------
//! - For every non-missing normalized value `0 ≤ v ≤ 1`.
//! - A constant indicator (`max == min`) normalizes its observed values to 0.
//! - Filling never crosses a country boundary.
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use statrs::statistics::Statistics;

use crate::stock::{
    core::{
        options::Fill,
        panel::Panel,
        validation::{check_cardinality, require_numeric},
    },
    errors::{StockResult, StockWarning},
};

/// Normalized and forward-filled versions of one indicator, row-aligned
/// with the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledIndicator {
    pub normalized: Array1<f64>,
    pub filled: Array1<f64>,
}

/// Min-max rescale over non-missing values.
pub fn min_max_normalize(values: &Array1<f64>) -> Array1<f64> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return values.clone();
    }
    let min = Statistics::min(&observed);
    let max = Statistics::max(&observed);
    let range = max - min;
    if range == 0.0 {
        return values.mapv(|v| if v.is_nan() { v } else { 0.0 });
    }
    values.mapv(|v| (v - min) / range)
}

/// Forward-fill runs of at most `fill` missing values within one series.
pub fn forward_fill(series: ArrayView1<'_, f64>, fill: usize) -> Vec<f64> {
    let mut out: Vec<f64> = series.to_vec();
    if fill == 0 {
        return out;
    }
    let n = out.len();
    let mut last: Option<f64> = None;
    let mut i = 0;
    while i < n {
        if !out[i].is_nan() {
            last = Some(out[i]);
            i += 1;
            continue;
        }
        let run_start = i;
        while i < n && out[i].is_nan() {
            i += 1;
        }
        if let Some(value) = last {
            if i - run_start <= fill {
                out[run_start..i].fill(value);
            }
        }
    }
    out
}

/// Validate, normalize, and forward-fill one indicator.
///
/// Parameters
/// ----------
/// - `panel`: identity-resolved panel holding the indicator column.
/// - `variable`: indicator name.
/// - `fill`: forward-fill horizon.
///
/// Returns
/// -------
/// The [`FilledIndicator`] and, for indicators with fewer than
/// [`MIN_DISTINCT_VALUES`](crate::stock::core::validation::MIN_DISTINCT_VALUES)
/// distinct observed values, a [`StockWarning::LowCardinality`].
///
/// Errors
/// ------
/// - `StockError::UnknownVariable` / `StockError::NonNumericVariable`.
pub fn normalize_and_fill(
    panel: &Panel, variable: &str, fill: Fill,
) -> StockResult<(FilledIndicator, Option<StockWarning>)> {
    let raw = require_numeric(variable, panel.column(variable))?;

    let warning = check_cardinality(variable, raw);
    if let Some(StockWarning::LowCardinality { distinct, .. }) = &warning {
        tracing::warn!(
            target: "stock_index::normalize",
            variable,
            distinct = *distinct,
            "normalize.low_cardinality"
        );
    }

    let normalized = min_max_normalize(raw);
    let filled: Array1<f64> = panel
        .spans()
        .par_iter()
        .map(|span| forward_fill(panel.country_view(span, &normalized), fill.years()))
        .collect::<Vec<Vec<f64>>>()
        .into_iter()
        .flatten()
        .collect();

    Ok((FilledIndicator { normalized, filled }, warning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Min-max round trip (observed min → 0, max → 1) and degenerate columns.
    // - Forward-fill horizon boundaries: runs of exactly `fill` are filled,
    //   runs of `fill + 1` are not; leading runs and `fill == 0`.
    //
    // Panel-level behavior (per-country isolation, warnings) is covered by
    // the pipeline tests.
    // -------------------------------------------------------------------------

    fn assert_same(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a.is_nan() && e.is_nan()) || (a - e).abs() < 1e-12,
                "got {actual:?}, expected {expected:?}"
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the normalized series spans exactly [0, 1] and keeps missing
    // cells missing.
    //
    // Given
    // -----
    // - `[2.0, NaN, 4.0, 6.0]`.
    //
    // Expect
    // ------
    // - `[0.0, NaN, 0.5, 1.0]`.
    fn min_max_normalize_maps_extremes_to_unit_interval() {
        let out = min_max_normalize(&array![2.0, f64::NAN, 4.0, 6.0]);

        assert_same(out.as_slice().unwrap(), &[0.0, f64::NAN, 0.5, 1.0]);
    }

    #[test]
    fn min_max_normalize_handles_constant_and_empty_columns() {
        let constant = min_max_normalize(&array![3.0, f64::NAN, 3.0]);
        let empty = min_max_normalize(&array![f64::NAN, f64::NAN]);

        assert_same(constant.as_slice().unwrap(), &[0.0, f64::NAN, 0.0]);
        assert!(empty.iter().all(|v| v.is_nan()));
    }

    #[test]
    // Purpose
    // -------
    // Verify that a gap of exactly `fill` years is filled while a gap of
    // `fill + 1` years is left entirely missing.
    //
    // Given
    // -----
    // - fill = 2.
    // - `[0.1, NaN, NaN, 0.4, NaN, NaN, NaN, 0.8]` (gaps of 2 and 3).
    //
    // Expect
    // ------
    // - `[0.1, 0.1, 0.1, 0.4, NaN, NaN, NaN, 0.8]`.
    fn forward_fill_respects_horizon_boundary() {
        let nan = f64::NAN;
        let series = array![0.1, nan, nan, 0.4, nan, nan, nan, 0.8];

        let out = forward_fill(series.view(), 2);

        assert_same(&out, &[0.1, 0.1, 0.1, 0.4, nan, nan, nan, 0.8]);
    }

    #[test]
    // Purpose
    // -------
    // Cover the edges: leading gaps are never filled, trailing gaps follow
    // the same horizon rule, and fill = 0 leaves the series untouched.
    //
    // Given
    // -----
    // - `[NaN, 0.5, NaN]` with fill 1 and with fill 0.
    //
    // Expect
    // ------
    // - fill 1 → `[NaN, 0.5, 0.5]`; fill 0 → input unchanged.
    fn forward_fill_leaves_leading_gap_and_honors_zero_horizon() {
        let nan = f64::NAN;
        let series = array![nan, 0.5, nan];

        assert_same(&forward_fill(series.view(), 1), &[nan, 0.5, 0.5]);
        assert_same(&forward_fill(series.view(), 0), &[nan, 0.5, nan]);
    }
}

//! Stock accumulator — the depreciation-weighted recurrence.
//!
//! Purpose
//! -------
//! Run, for one indicator and one depreciation weight `w`, the recurrence
//!
//! `stock[start] = 0`,
//! `stock[t] = w · stock[t−1] + antecedent[t−1]` for `t > start`,
//!
//! independently for every country, then discard the uninformative seed,
//! blank out years before the country's first raw observation, and apply
//! the Koyck rescaling `stock · (1 − w)`.
//!
//! Key behaviors
//! -------------
//! - `start` is the country's first year with a non-missing antecedent
//!   value; `keep` is its first year with a non-missing *raw* value. The
//!   recurrence starts at `start` even when `keep` is later, so predecessor
//!   history is folded into the stock before the country's own record.
//! - A missing antecedent value after `start` makes every later stock value
//!   missing (the recurrence has no defined predecessor).
//! - Countries with no antecedent or no raw observation get all-missing
//!   stock values; the rest of the panel is unaffected.
//! - Countries are processed as independent rayon tasks; each task owns its
//!   output block and results are concatenated in country order.
//!
//! Invariants & assumptions
//! ------------------------
//! - `w ∈ (0, 1)` is guaranteed by [`Weight`].
//! - With antecedent values in [0, 1], `stock_raw ≤ Σ wᵏ = 1 / (1 − w)`, so
//!   the rescaled value lies in [0, 1].
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;

use crate::stock::{
    core::{options::Weight, panel::Panel, validation::require_numeric},
    errors::StockResult,
};

/// StockSeries — raw and rescaled stock for one (indicator, weight) pair.
///
/// Fields
/// ------
/// - `raw`: row-aligned `stock_raw` (missing at the seed year, before
///   `keep_year`, and wherever the recurrence is undefined).
/// - `rescaled`: `raw · (1 − w)`.
/// - `start_years` / `keep_years`: per country, in span order.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSeries {
    pub raw: Array1<f64>,
    pub rescaled: Array1<f64>,
    pub start_years: Vec<Option<i32>>,
    pub keep_years: Vec<Option<i32>>,
}

/// Result of the recurrence for a single country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryStock {
    pub raw: Vec<f64>,
    /// Offset of the seed year within the country's block.
    pub start: Option<usize>,
    /// Offset of the first raw observation within the country's block.
    pub keep: Option<usize>,
}

/// Run the recurrence over one country's year-ordered block.
///
/// Parameters
/// ----------
/// - `antecedent`: antecedent values, one per year.
/// - `observed`: raw, unimputed indicator values, one per year.
/// - `weight`: depreciation weight `w`.
pub fn accumulate_country(
    antecedent: ArrayView1<'_, f64>, observed: ArrayView1<'_, f64>, weight: f64,
) -> CountryStock {
    let n = antecedent.len();
    let mut stock = vec![f64::NAN; n];
    let start = antecedent.iter().position(|v| !v.is_nan());
    let keep = observed.iter().position(|v| !v.is_nan());

    if let Some(s) = start {
        stock[s] = 0.0;
        for t in s + 1..n {
            stock[t] = weight * stock[t - 1] + antecedent[t - 1];
        }
        // Seed carries no information.
        stock[s] = f64::NAN;
    }

    let cutoff = keep.unwrap_or(n);
    stock[..cutoff].fill(f64::NAN);

    CountryStock { raw: stock, start, keep }
}

/// Accumulate one indicator at one weight across the whole panel.
///
/// Errors
/// ------
/// - `StockError::UnknownVariable` / `StockError::NonNumericVariable` if the
///   raw indicator column is unavailable.
pub fn accumulate_stock(
    panel: &Panel, variable: &str, antecedent: &Array1<f64>, weight: &Weight,
) -> StockResult<StockSeries> {
    let observed = require_numeric(variable, panel.column(variable))?;
    let w = weight.value();

    let countries: Vec<CountryStock> = panel
        .spans()
        .par_iter()
        .map(|span| {
            accumulate_country(
                panel.country_view(span, antecedent),
                panel.country_view(span, observed),
                w,
            )
        })
        .collect();

    let max_offset = panel
        .spans()
        .iter()
        .zip(&countries)
        .filter_map(|(span, c)| c.start.map(|s| span.len - 1 - s))
        .max()
        .unwrap_or(0);
    let seeded = countries.iter().filter(|c| c.start.is_some()).count();
    tracing::debug!(
        target: "stock_index::accumulate",
        variable,
        weight = w,
        seeded,
        countries = countries.len(),
        max_offset,
        "accumulate.done"
    );

    let mut start_years = Vec::with_capacity(countries.len());
    let mut keep_years = Vec::with_capacity(countries.len());
    let mut raw = Vec::with_capacity(panel.len());
    for (span, country) in panel.spans().iter().zip(countries) {
        start_years.push(country.start.map(|s| span.first_year + s as i32));
        keep_years.push(country.keep.map(|k| span.first_year + k as i32));
        raw.extend(country.raw);
    }
    let raw = Array1::from(raw);
    let rescaled = raw.mapv(|v| v * (1.0 - w));

    Ok(StockSeries { raw, rescaled, start_years, keep_years })
}

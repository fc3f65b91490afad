//! Output assembler — the final stock table.
//!
//! Purpose
//! -------
//! Collect the per-(indicator, weight) stock series into the table handed
//! back to callers, dropping intermediate state (normalized, filled, and
//! antecedent values, start-year markers) and years before each country's
//! first raw observation.
//!
//! Key behaviors
//! -------------
//! - Row retention: for each country, rows before the earliest `keep_year`
//!   across all stock series are dropped. Countries with no raw observation
//!   for any requested indicator keep every row, with missing stocks.
//! - Column order: `country_name`, `country_id_hist`, `country_id`, `year`,
//!   the extra variables in request order, then for each (indicator, weight)
//!   pair `{indicator}{label}_raw` followed by `{indicator}{label}`.
//! - Stock columns are held in a typed list of [`StockColumns`] keyed by
//!   indicator and [`Weight`], not by generated field names; names are only
//!   rendered on request.
use ndarray::Array1;

use crate::stock::{
    core::{
        accumulate::StockSeries,
        expand::ExpansionReport,
        options::Weight,
        panel::{Column, Panel},
    },
    errors::StockWarning,
};

/// Raw and rescaled stock of one (indicator, weight) pair, row-aligned with
/// the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct StockColumns {
    pub variable: String,
    pub weight: Weight,
    pub raw: Array1<f64>,
    pub rescaled: Array1<f64>,
}

impl StockColumns {
    /// `{variable}{label}_raw`, e.g. `v2x_polyarchy.99_raw`.
    pub fn raw_name(&self) -> String {
        format!("{}{}_raw", self.variable, self.weight.label())
    }

    /// `{variable}{label}`, e.g. `v2x_polyarchy.99`.
    pub fn rescaled_name(&self) -> String {
        format!("{}{}", self.variable, self.weight.label())
    }
}

/// Diagnostics gathered over one pipeline run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineReport {
    /// Excluded entities present in the input, as `(country_id, name)`.
    pub excluded: Vec<(i64, String)>,
    /// Rows synthesized while regularizing year coverage.
    pub synthesized_rows: usize,
    /// Non-fatal warnings, in the order they were raised.
    pub warnings: Vec<StockWarning>,
}

impl PipelineReport {
    pub(crate) fn new(expansion: ExpansionReport, warnings: Vec<StockWarning>) -> Self {
        PipelineReport {
            excluded: expansion.excluded,
            synthesized_rows: expansion.synthesized_rows,
            warnings,
        }
    }
}

/// StockTable — one row per retained (country, year).
#[derive(Debug, Clone, PartialEq)]
pub struct StockTable {
    pub country_name: Vec<String>,
    pub country_id_hist: Vec<i64>,
    pub country_id: Vec<i64>,
    pub year: Vec<i32>,
    /// Extra variables in request order.
    pub extras: Vec<(String, Column)>,
    /// Stock columns in request order (indicator-major, then weight).
    pub stocks: Vec<StockColumns>,
    pub report: PipelineReport,
}

impl StockTable {
    pub fn len(&self) -> usize {
        self.year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_empty()
    }

    /// Stock columns for `(variable, weight)`; weights match by label.
    pub fn stock(&self, variable: &str, weight: f64) -> Option<&StockColumns> {
        let label = Weight::new(weight).ok()?;
        self.stocks
            .iter()
            .find(|s| s.variable == variable && s.weight.label() == label.label())
    }

    pub fn extra(&self, name: &str) -> Option<&Column> {
        self.extras.iter().find(|(n, _)| n == name).map(|(_, col)| col)
    }

    /// Row index of `(country_id, year)`, if retained.
    pub fn row_of(&self, country_id: i64, year: i32) -> Option<usize> {
        self.country_id.iter().zip(&self.year).position(|(&c, &y)| c == country_id && y == year)
    }

    /// Column names in output order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["country_name", "country_id_hist", "country_id", "year"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(self.extras.iter().map(|(name, _)| name.clone()));
        for stock in &self.stocks {
            names.push(stock.raw_name());
            names.push(stock.rescaled_name());
        }
        names
    }
}

/// Assemble the output table from the resolved panel and the stock series.
///
/// Parameters
/// ----------
/// - `panel`: identity-resolved panel (supplies keys and extra columns).
/// - `extra_variables`: names of the extra columns, in request order.
/// - `series`: `(variable, weight, series)` triples in request order.
/// - `report`: diagnostics to attach.
pub fn assemble(
    panel: &Panel, extra_variables: &[String], series: Vec<(String, Weight, StockSeries)>,
    report: PipelineReport,
) -> StockTable {
    let mut retained: Vec<usize> = Vec::with_capacity(panel.len());
    let mut country_name = Vec::with_capacity(panel.len());
    for (idx, span) in panel.spans().iter().enumerate() {
        let trim_year = series.iter().filter_map(|(_, _, s)| s.keep_years[idx]).min();
        for row in span.rows() {
            if trim_year.map_or(true, |keep| panel.year()[row] >= keep) {
                retained.push(row);
                country_name.push(span.country_name.clone());
            }
        }
    }

    let pick =
        |values: &Array1<f64>| -> Array1<f64> { retained.iter().map(|&r| values[r]).collect() };
    let rows: Vec<Option<usize>> = retained.iter().map(|&r| Some(r)).collect();

    let extras = extra_variables
        .iter()
        .filter_map(|name| panel.column(name).map(|col| (name.clone(), col.gather(&rows))))
        .collect();

    let stocks = series
        .into_iter()
        .map(|(variable, weight, s)| StockColumns {
            variable,
            weight,
            raw: pick(&s.raw),
            rescaled: pick(&s.rescaled),
        })
        .collect();

    StockTable {
        country_name,
        country_id_hist: retained.iter().map(|&r| panel.country_id_hist()[r]).collect(),
        country_id: retained.iter().map(|&r| panel.country_id()[r]).collect(),
        year: retained.iter().map(|&r| panel.year()[r]).collect(),
        extras,
        stocks,
        report,
    }
}

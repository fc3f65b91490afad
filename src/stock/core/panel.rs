//! Country-year panel containers for the stock pipeline.
//!
//! Purpose
//! -------
//! Provide the raw input table handed over by a dataset provider
//! ([`RawPanel`]) and the regularized, country-blocked table every pipeline
//! stage works on ([`Panel`]).
//!
//! Key behaviors
//! -------------
//! - [`RawPanel`] stores the key columns (`country_id`, `country_name`,
//!   `year`) plus arbitrary named [`Column`]s, and validates column lengths
//!   on insertion.
//! - [`DatasetProvider`] abstracts where the raw panel comes from; the
//!   pipeline fails with `StockError::MissingDataset` when it yields nothing.
//! - [`Panel`] lays rows out in contiguous per-country blocks
//!   ([`CountrySpan`]) ordered by `country_id`, each covering every year in
//!   `[first_year, last_year]`, so a country's series is a plain slice.
//!
//! Invariants & assumptions
//! ------------------------
//! - Missing numeric values are `f64::NAN`; missing text values are `None`.
//! - In a [`Panel`], `(country_id, year)` is unique and
//!   `row = span.start + (year - span.first_year)`.
//! - Spans are sorted by `country_id` and tile `0..panel.len()` without gaps.
//!
//! Conventions
//! -----------
//! - Row indices are 0-based; years are `i32`, identifiers are `i64`.
use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView1, s};

use crate::stock::errors::{StockError, StockResult};

/// Column — a single named column of a panel.
///
/// Numeric columns carry `NaN` for missing values; text columns carry
/// `None`. Only numeric columns can be used as stock indicators.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Array1<f64>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&Array1<f64>> {
        match self {
            Column::Numeric(values) => Some(values),
            Column::Text(_) => None,
        }
    }

    /// Gather rows by index; `None` produces a missing cell.
    pub(crate) fn gather(&self, rows: &[Option<usize>]) -> Column {
        match self {
            Column::Numeric(values) => Column::Numeric(
                rows.iter().map(|row| row.map_or(f64::NAN, |i| values[i])).collect(),
            ),
            Column::Text(values) => {
                Column::Text(rows.iter().map(|row| row.and_then(|i| values[i].clone())).collect())
            }
        }
    }
}

/// RawPanel — the country-year table returned by a dataset provider.
///
/// Purpose
/// -------
/// Represent the unprocessed input panel: one row per observation, keyed by
/// `country_id` and `year`, with a country name and any number of named
/// indicator or auxiliary columns. Rows may be unordered and a country's
/// years may have holes.
///
/// Fields
/// ------
/// - `country_id`: `Vec<i64>`
///   Country identifier per row.
/// - `country_name`: `Vec<String>`
///   Country name per row.
/// - `year`: `Vec<i32>`
///   Calendar year per row.
/// - `columns`: `BTreeMap<String, Column>`
///   Named data columns, each with exactly `len()` rows.
///
/// Invariants
/// ----------
/// - All key columns and data columns share the same length; enforced by
///   [`RawPanel::new`] and [`RawPanel::with_column`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPanel {
    country_id: Vec<i64>,
    country_name: Vec<String>,
    year: Vec<i32>,
    columns: BTreeMap<String, Column>,
}

impl RawPanel {
    /// Construct a panel from its key columns.
    ///
    /// Errors
    /// ------
    /// - `StockError::ColumnLength` when `country_name` or `year` differ in
    ///   length from `country_id`.
    pub fn new(
        country_id: Vec<i64>, country_name: Vec<String>, year: Vec<i32>,
    ) -> StockResult<Self> {
        let expected = country_id.len();
        if country_name.len() != expected {
            return Err(StockError::ColumnLength {
                name: "country_name".into(),
                expected,
                actual: country_name.len(),
            });
        }
        if year.len() != expected {
            return Err(StockError::ColumnLength {
                name: "year".into(),
                expected,
                actual: year.len(),
            });
        }
        Ok(RawPanel { country_id, country_name, year, columns: BTreeMap::new() })
    }

    /// Attach (or replace) a named column.
    ///
    /// Errors
    /// ------
    /// - `StockError::ColumnLength` when the column length differs from the
    ///   number of rows.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> StockResult<Self> {
        let name = name.into();
        if column.len() != self.len() {
            return Err(StockError::ColumnLength {
                name,
                expected: self.len(),
                actual: column.len(),
            });
        }
        self.columns.insert(name, column);
        Ok(self)
    }

    /// Attach a numeric column; `None` entries become missing.
    pub fn with_numeric(
        self, name: impl Into<String>, values: Vec<Option<f64>>,
    ) -> StockResult<Self> {
        let values: Array1<f64> = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        self.with_column(name, Column::Numeric(values))
    }

    /// Attach a text column; `None` entries become missing.
    pub fn with_text(self, name: impl Into<String>, values: Vec<Option<String>>) -> StockResult<Self> {
        self.with_column(name, Column::Text(values))
    }

    pub fn len(&self) -> usize {
        self.country_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.country_id.is_empty()
    }

    pub fn country_id(&self) -> &[i64] {
        &self.country_id
    }

    pub fn country_name(&self) -> &[String] {
        &self.country_name
    }

    pub fn year(&self) -> &[i32] {
        &self.year
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// DatasetProvider — source of the raw country-year panel.
///
/// Implementors hand the pipeline a borrowed [`RawPanel`], or `None` when no
/// dataset is available; the pipeline then fails with
/// `StockError::MissingDataset` instead of substituting a default.
pub trait DatasetProvider {
    fn dataset(&self) -> Option<&RawPanel>;
}

impl DatasetProvider for RawPanel {
    fn dataset(&self) -> Option<&RawPanel> {
        Some(self)
    }
}

impl DatasetProvider for Option<RawPanel> {
    fn dataset(&self) -> Option<&RawPanel> {
        self.as_ref()
    }
}

/// CountrySpan — the contiguous block of rows owned by one country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountrySpan {
    pub country_id: i64,
    pub country_name: String,
    /// First row of the block.
    pub start: usize,
    /// Number of rows (one per year).
    pub len: usize,
    pub first_year: i32,
}

impl CountrySpan {
    pub fn last_year(&self) -> i32 {
        self.first_year + self.len as i32 - 1
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }

    /// Row index of `year`, if the year lies inside the span.
    pub fn row_of(&self, year: i32) -> Option<usize> {
        if year < self.first_year || year > self.last_year() {
            return None;
        }
        Some(self.start + (year - self.first_year) as usize)
    }
}

/// Panel — regularized country-year table.
///
/// Purpose
/// -------
/// Hold the expanded panel produced by the filter & expander stage: every
/// retained country covers every year between its first and last observed
/// year, with synthesized rows flagged by `is_original == false`. The
/// identity resolver fills `country_id_hist`; later stages only read it.
///
/// Fields
/// ------
/// - `spans`: per-country row blocks, sorted by `country_id`.
/// - `country_id`, `year`, `is_original`, `country_id_hist`: per-row keys.
/// - `columns`: the requested indicators and extra columns, row-aligned.
///
/// Invariants
/// ----------
/// - All per-row vectors and columns have `len()` rows.
/// - Within a span, `year[start + k] == first_year + k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub(crate) spans: Vec<CountrySpan>,
    pub(crate) country_id: Vec<i64>,
    pub(crate) year: Vec<i32>,
    pub(crate) is_original: Vec<bool>,
    pub(crate) country_id_hist: Vec<i64>,
    pub(crate) columns: BTreeMap<String, Column>,
}

impl Panel {
    pub fn len(&self) -> usize {
        self.year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_empty()
    }

    pub fn spans(&self) -> &[CountrySpan] {
        &self.spans
    }

    pub fn country_id(&self) -> &[i64] {
        &self.country_id
    }

    pub fn year(&self) -> &[i32] {
        &self.year
    }

    pub fn is_original(&self) -> &[bool] {
        &self.is_original
    }

    pub fn country_id_hist(&self) -> &[i64] {
        &self.country_id_hist
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn span(&self, country_id: i64) -> Option<&CountrySpan> {
        self.spans
            .binary_search_by_key(&country_id, |span| span.country_id)
            .ok()
            .map(|idx| &self.spans[idx])
    }

    /// Row index of `(country_id, year)`, if present.
    pub fn row_of(&self, country_id: i64, year: i32) -> Option<usize> {
        self.span(country_id).and_then(|span| span.row_of(year))
    }

    /// Slice of a row-aligned series covering one country's block.
    pub fn country_view<'a>(&self, span: &CountrySpan, values: &'a Array1<f64>) -> ArrayView1<'a, f64> {
        values.slice(s![span.start..span.start + span.len])
    }

    /// Replace the historical identifiers; used by the identity resolver.
    pub(crate) fn with_country_id_hist(mut self, country_id_hist: Vec<i64>) -> Self {
        debug_assert_eq!(country_id_hist.len(), self.len());
        self.country_id_hist = country_id_hist;
        self
    }
}

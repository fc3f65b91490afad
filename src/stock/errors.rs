//! stock::errors — error and warning types for the stock pipeline.
//!
//! Purpose
//! -------
//! Provide the error enum, result alias, and non-fatal warning type shared by
//! every stage of the stock pipeline (panel expansion, identity resolution,
//! normalization, antecedent resolution, accumulation, and assembly).
//!
//! Key behaviors
//! -------------
//! - [`StockError`] enumerates validation failures that abort a run:
//!   missing dataset, unknown / non-numeric columns, invalid weights or fill
//!   horizons, malformed input panels, and malformed identity tables.
//! - [`StockWarning`] records conditions that are reported but do not stop
//!   the computation (currently low-cardinality indicators).
//! - With the `python-bindings` feature, `From<StockError> for PyErr` maps
//!   every variant to a `ValueError` carrying the `Display` message.
//!
//! Conventions
//! -----------
//! - Messages are phrased in terms of the offending input ("variable `x` is
//!   not numeric") rather than internal state.
//! - Payloads are owned and cheap to clone so errors can cross rayon task
//!   boundaries and be compared in tests.
//!
//! Testing notes
//! -------------
//! - Unit tests check that `Display` output embeds the offending payloads.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};
use thiserror::Error;

/// Result alias for stock-pipeline operations that may produce [`StockError`].
pub type StockResult<T> = Result<T, StockError>;

/// Unified error type for the stock pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    // ---- Dataset ----
    /// The dataset provider returned no panel.
    #[error("no panel dataset has been supplied")]
    MissingDataset,

    /// An input column does not match the length of the key columns.
    #[error("column `{name}` has {actual} rows, expected {expected}")]
    ColumnLength { name: String, expected: usize, actual: usize },

    /// Two input rows share the same (country_id, year) key.
    #[error("duplicate observation for country {country_id} in year {year}")]
    DuplicateObservation { country_id: i64, year: i32 },

    // ---- Variables ----
    /// A requested indicator or extra column is absent from the panel.
    #[error("variable `{name}` is not a column of the panel")]
    UnknownVariable { name: String },

    /// A requested indicator is not stored as a numeric column.
    #[error("variable `{name}` is not numeric")]
    NonNumericVariable { name: String },

    // ---- Options ----
    /// Depreciation weight outside the open interval (0, 1).
    #[error("weight must lie strictly between 0 and 1; got {value}")]
    InvalidWeight { value: f64 },

    /// Fill horizon negative, non-finite, or not an integer.
    #[error("fill must be a non-negative integer; got {value}")]
    InvalidFill { value: f64 },

    /// Option document could not be parsed.
    #[error("invalid stock options: {reason}")]
    Config { reason: String },

    // ---- Identity table ----
    /// Identity table could not be parsed or failed validation.
    #[error("invalid historical identity table: {reason}")]
    IdentityTable { reason: String },

    /// A configuration file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Non-fatal conditions raised while computing a stock.
#[derive(Debug, Clone, PartialEq)]
pub enum StockWarning {
    /// Indicator has fewer than the required number of distinct observed
    /// values; it may not be suitable as a stock measure.
    LowCardinality { variable: String, distinct: usize },
}

impl std::fmt::Display for StockWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockWarning::LowCardinality { variable, distinct } => write!(
                f,
                "variable `{variable}` has only {distinct} distinct values; measure may not be suitable"
            ),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<StockError> for PyErr {
    fn from(err: StockError) -> PyErr {
        PyValueError::new_err(format!("StockError: {err}"))
    }
}

//! Column guards shared by the pipeline stages.
//!
//! Purpose
//! -------
//! Centralize the checks every stage needs before touching a requested
//! column: presence (`UnknownVariable`), numeric storage
//! (`NonNumericVariable`), and the non-fatal low-cardinality screen.
//!
//! Conventions
//! -----------
//! - Guards take the already looked-up `Option<&Column>` so they serve both
//!   [`RawPanel`](crate::stock::core::panel::RawPanel) and
//!   [`Panel`](crate::stock::core::panel::Panel) lookups.
//! - Missing (`NaN`) values never count as observed values.
use std::collections::BTreeSet;

use ndarray::Array1;

use crate::stock::{
    core::panel::Column,
    errors::{StockError, StockResult, StockWarning},
};

/// Indicators with fewer distinct observed values than this raise a
/// low-cardinality warning.
pub const MIN_DISTINCT_VALUES: usize = 10;

/// Require that a requested column exists.
pub fn require_column<'a>(name: &str, column: Option<&'a Column>) -> StockResult<&'a Column> {
    column.ok_or_else(|| StockError::UnknownVariable { name: name.to_string() })
}

/// Require that a requested column exists and is numeric.
///
/// Errors
/// ------
/// - `StockError::UnknownVariable` when `column` is `None`.
/// - `StockError::NonNumericVariable` when the column stores text.
pub fn require_numeric<'a>(name: &str, column: Option<&'a Column>) -> StockResult<&'a Array1<f64>> {
    require_column(name, column)?
        .as_numeric()
        .ok_or_else(|| StockError::NonNumericVariable { name: name.to_string() })
}

/// Number of distinct non-missing values. `-0.0` and `0.0` count as one.
pub fn distinct_observed(values: &Array1<f64>) -> usize {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() })
        .collect::<BTreeSet<u64>>()
        .len()
}

/// Low-cardinality screen; returns a warning instead of failing.
pub fn check_cardinality(name: &str, values: &Array1<f64>) -> Option<StockWarning> {
    let distinct = distinct_observed(values);
    (distinct < MIN_DISTINCT_VALUES)
        .then(|| StockWarning::LowCardinality { variable: name.to_string(), distinct })
}

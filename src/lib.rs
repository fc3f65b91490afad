//! stock_index — depreciation-weighted stock indices with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! the stock computation to Python via the `_stock_index` extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the [`stock`] module as the public crate surface.
//! - With the `python-bindings` feature, define the `compute_stock`
//!   `#[pyfunction]` and the `#[pymodule]` initializer for `_stock_index`.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in [`stock`]; this file performs only FFI glue,
//!   option defaulting, and error mapping.
//! - The pipeline runs with the GIL released; Python objects are converted to
//!   owned Rust values before the run and back afterwards.
//!
//! Conventions
//! -----------
//! - Errors from core Rust code are propagated as [`StockError`] internally
//!   and converted to `ValueError` at the PyO3 boundary.
//! - Non-fatal [`StockWarning`]s surface in Python as `UserWarning`s.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code should depend on [`stock`] (or `stock::prelude`) and can
//!   ignore the PyO3 items guarded by the `python-bindings` feature.
//! - The Python packaging layer imports `_stock_index` and wraps
//!   `compute_stock` in a user-facing API.
//!
//! Testing notes
//! -------------
//! - Core behavior is covered by unit tests in the inner modules and by
//!   `tests/integration_stock_pipeline.rs`.

pub mod stock;
pub mod utils;

pub use stock::{
    PipelineReport, RawPanel, StockError, StockOptions, StockPipeline, StockResult, StockTable,
    StockWarning, compute_stock,
};

#[cfg(feature = "python-bindings")]
use std::ffi::CString;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyUserWarning, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::{
    stock::core::options::{DEFAULT_VARIABLE, DEFAULT_WEIGHT, Fill},
    utils::{extract_raw_panel, table_to_dict},
};

/// compute_stock — Python entry point for the stock computation.
///
/// Parameters
/// ----------
/// Called from Python as
/// `compute_stock(data, variables=None, weights=None, fill=5, extra_variables=None)`:
/// - `data`: mapping of column name → column (`dict`, `pandas.DataFrame`).
///   Must hold `country_id`, `country_name`, and `year`; `None` raises.
/// - `variables`: indicator columns; defaults to `["v2x_polyarchy"]`.
/// - `weights`: depreciation weights in (0, 1); defaults to `[0.99]`.
/// - `fill`: non-negative whole number of years to forward-fill.
/// - `extra_variables`: columns copied through to the output.
///
/// Returns
/// -------
/// A `dict` of output columns in table order, numeric columns as numpy arrays.
///
/// Errors
/// ------
/// - `ValueError` for every [`StockError`] (missing dataset, unknown or
///   non-numeric variable, invalid weight or fill, duplicate keys).
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    name = "compute_stock",
    text_signature = "(data, /, variables=None, weights=None, fill=5, extra_variables=None)",
    signature = (data, variables = None, weights = None, fill = 5.0, extra_variables = None)
)]
pub fn py_compute_stock<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>, variables: Option<Vec<String>>,
    weights: Option<Vec<f64>>, fill: f64, extra_variables: Option<Vec<String>>,
) -> PyResult<Bound<'py, PyDict>> {
    let variables = variables.unwrap_or_else(|| vec![DEFAULT_VARIABLE.to_string()]);
    let weights = weights.unwrap_or_else(|| vec![DEFAULT_WEIGHT]);
    let options = StockOptions::new(variables, &weights, 0, extra_variables.unwrap_or_default())?
        .with_fill(Fill::from_f64(fill)?);

    if data.is_none() {
        return Err(StockError::MissingDataset.into());
    }
    let mut requested = options.variables().to_vec();
    requested.extend(options.extra_variables().iter().cloned());
    let panel = extract_raw_panel(py, data, &requested)?;

    let table = py.allow_threads(|| -> StockResult<StockTable> {
        StockPipeline::new()?.run(&panel, &options)
    })?;

    for warning in &table.report.warnings {
        let message = CString::new(warning.to_string())
            .map_err(|err| PyValueError::new_err(err.to_string()))?;
        PyErr::warn(py, py.get_type::<PyUserWarning>().as_any(), &message, 1)?;
    }
    table_to_dict(py, &table)
}

/// _stock_index — PyO3 module initializer for the Python extension.
///
/// Notes
/// -----
/// - Invoked automatically by Python when importing the compiled extension;
///   it is not called directly by user code.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _stock_index<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_compute_stock, m)?)?;
    m.add("DEFAULT_VARIABLE", DEFAULT_VARIABLE)?;
    m.add("DEFAULT_WEIGHT", DEFAULT_WEIGHT)?;
    m.add("DEFAULT_FILL", crate::stock::core::options::DEFAULT_FILL)?;
    Ok(())
}

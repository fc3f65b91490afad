//! Python → Rust conversion helpers for the `python-bindings` surface.
//!
//! Inputs arrive as any mapping of column name → column (a `dict` of lists,
//! a `pandas.DataFrame`, a `dict` of numpy arrays); outputs leave as a
//! `dict` of columns with numeric data as numpy arrays.
#[cfg(feature = "python-bindings")]
use ndarray::Array1;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::stock::{
    core::panel::{Column, RawPanel},
    output::StockTable,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Array1 → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
};

#[cfg(feature = "python-bindings")]
const KEY_COLUMNS: [&str; 3] = ["country_id", "country_name", "year"];

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Build a [`RawPanel`] from a Python mapping of columns.
///
/// Only the key columns and the `requested` data columns are read; a
/// requested column absent from `data` is left out so the pipeline can
/// report it as an unknown variable.
///
/// Errors
/// ------
/// - `ValueError` when a key column is missing or columns are ragged.
/// - `TypeError` when a column holds neither numbers nor strings.
#[cfg(feature = "python-bindings")]
pub fn extract_raw_panel<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>, requested: &[String],
) -> PyResult<RawPanel> {
    for key in KEY_COLUMNS {
        if !data.contains(key)? {
            return Err(PyValueError::new_err(format!("data is missing key column {key:?}")));
        }
    }
    let country_id: Vec<i64> = as_list(&data.get_item("country_id")?)?
        .extract()
        .map_err(|_| PyTypeError::new_err("country_id must hold integers"))?;
    let country_name: Vec<String> = as_list(&data.get_item("country_name")?)?
        .extract()
        .map_err(|_| PyTypeError::new_err("country_name must hold strings"))?;
    let year: Vec<i32> = as_list(&data.get_item("year")?)?
        .extract()
        .map_err(|_| PyTypeError::new_err("year must hold integers"))?;

    let mut panel = RawPanel::new(country_id, country_name, year)?;
    for name in requested {
        if KEY_COLUMNS.contains(&name.as_str()) || !data.contains(name.as_str())? {
            continue;
        }
        let column = extract_column(py, name, &data.get_item(name.as_str())?)?;
        panel = panel.with_column(name.as_str(), column)?;
    }
    Ok(panel)
}

/// Render a [`StockTable`] as a `dict` of columns in output order.
#[cfg(feature = "python-bindings")]
pub fn table_to_dict<'py>(py: Python<'py>, table: &StockTable) -> PyResult<Bound<'py, PyDict>> {
    let out = PyDict::new(py);
    out.set_item("country_name", table.country_name.clone())?;
    out.set_item("country_id_hist", table.country_id_hist.clone())?;
    out.set_item("country_id", table.country_id.clone())?;
    out.set_item("year", table.year.clone())?;
    for (name, column) in &table.extras {
        match column {
            Column::Numeric(values) => out.set_item(name, values.clone().into_pyarray(py))?,
            Column::Text(values) => out.set_item(name, values.clone())?,
        }
    }
    for stock in &table.stocks {
        out.set_item(stock.raw_name(), stock.raw.clone().into_pyarray(py))?;
        out.set_item(stock.rescaled_name(), stock.rescaled.clone().into_pyarray(py))?;
    }
    Ok(out)
}

// ---- Helper Methods ----

#[cfg(feature = "python-bindings")]
fn as_list<'py>(column: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    if column.hasattr("tolist")? { column.call_method0("tolist") } else { Ok(column.clone()) }
}

#[cfg(feature = "python-bindings")]
fn extract_column<'py>(py: Python<'py>, name: &str, raw: &Bound<'py, PyAny>) -> PyResult<Column> {
    if let Ok(arr) = extract_f64_array(py, raw) {
        if let Ok(slice) = arr.as_slice() {
            return Ok(Column::Numeric(Array1::from(slice.to_vec())));
        }
    }
    let list = as_list(raw)?;
    if let Ok(values) = list.extract::<Vec<Option<f64>>>() {
        return Ok(Column::Numeric(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()));
    }
    if let Ok(values) = list.extract::<Vec<Option<String>>>() {
        return Ok(Column::Text(values));
    }
    Err(PyTypeError::new_err(format!("column {name:?} must hold numbers or strings")))
}

//! Stock options — validated weights, fill horizon, and variable lists.
//!
//! Purpose
//! -------
//! Gather every caller-controlled setting of a stock computation into one
//! validated value, [`StockOptions`], so that downstream stages can assume
//! weights lie in (0, 1) and the fill horizon is a non-negative integer.
//!
//! Key behaviors
//! -------------
//! - [`Weight`] validates a depreciation weight and carries its output
//!   label (decimal literal without the leading zero, e.g. `0.99 → ".99"`).
//! - [`Fill`] validates the forward-fill horizon from integer or float input.
//! - [`StockOptions`] defaults to `variables = ["v2x_polyarchy"]`,
//!   `weights = [0.99]`, `fill = 5`, no extra variables, and can be read
//!   from a JSON document with the same field names.
//!
//! Conventions
//! -----------
//! - Requested lists are de-duplicated keeping the first occurrence, so
//!   generated column names never collide.
//! - Option errors are reported eagerly, before any data is touched.
use std::{fs, path::Path};

use serde::Deserialize;

use crate::stock::errors::{StockError, StockResult};

pub const DEFAULT_VARIABLE: &str = "v2x_polyarchy";
pub const DEFAULT_WEIGHT: f64 = 0.99;
pub const DEFAULT_FILL: usize = 5;

/// Weight — depreciation weight `w ∈ (0, 1)` and its column label.
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    value: f64,
    label: String,
}

impl Weight {
    /// Validate a weight.
    ///
    /// Errors
    /// ------
    /// - `StockError::InvalidWeight` if `value` is not finite or lies
    ///   outside the open interval (0, 1).
    pub fn new(value: f64) -> StockResult<Self> {
        if !value.is_finite() || value <= 0.0 || value >= 1.0 {
            return Err(StockError::InvalidWeight { value });
        }
        Ok(Weight::labelled(value))
    }

    /// Attach the label to an already validated value.
    ///
    /// The label is the shortest decimal literal of `value` rounded to 15
    /// significant digits, without the leading zero, so `0.1 + 0.2` renders
    /// as `".3"` rather than `".30000000000000004"`.
    fn labelled(value: f64) -> Self {
        let rounded: f64 = format!("{value:.14e}").parse().unwrap_or(value);
        let literal = rounded.to_string();
        let label = literal.strip_prefix('0').unwrap_or(&literal).to_string();
        Weight { value, label }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Column label, e.g. `".99"` for `0.99`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Fill — forward-fill horizon in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill(usize);

impl Fill {
    /// Errors
    /// ------
    /// - `StockError::InvalidFill` when `value < 0`.
    pub fn new(value: i64) -> StockResult<Self> {
        usize::try_from(value).map(Fill).map_err(|_| StockError::InvalidFill { value: value as f64 })
    }

    /// Errors
    /// ------
    /// - `StockError::InvalidFill` when `value` is negative, non-finite, or
    ///   has a fractional part.
    pub fn from_f64(value: f64) -> StockResult<Self> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(StockError::InvalidFill { value });
        }
        Ok(Fill(value as usize))
    }

    pub fn years(self) -> usize {
        self.0
    }
}

impl Default for Fill {
    fn default() -> Self {
        Fill(DEFAULT_FILL)
    }
}

/// StockOptions — validated configuration of one stock computation.
///
/// Fields
/// ------
/// - `variables`: indicator columns to accumulate.
/// - `weights`: depreciation weights; every indicator is accumulated once
///   per weight.
/// - `fill`: forward-fill horizon applied after normalization.
/// - `extra_variables`: columns carried through to the output untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StockOptions {
    variables: Vec<String>,
    weights: Vec<Weight>,
    fill: Fill,
    extra_variables: Vec<String>,
}

impl Default for StockOptions {
    fn default() -> Self {
        StockOptions {
            variables: vec![DEFAULT_VARIABLE.to_string()],
            weights: vec![Weight::labelled(DEFAULT_WEIGHT)],
            fill: Fill::default(),
            extra_variables: Vec::new(),
        }
    }
}

impl StockOptions {
    /// Build and validate options.
    ///
    /// Errors
    /// ------
    /// - `StockError::InvalidWeight` for the first weight outside (0, 1).
    /// - `StockError::InvalidFill` when `fill < 0`.
    pub fn new(
        variables: Vec<String>, weights: &[f64], fill: i64, extra_variables: Vec<String>,
    ) -> StockResult<Self> {
        let weights = weights.iter().map(|&w| Weight::new(w)).collect::<StockResult<Vec<_>>>()?;
        Ok(StockOptions {
            variables: dedup(variables),
            weights: dedup_weights(weights),
            fill: Fill::new(fill)?,
            extra_variables: dedup(extra_variables),
        })
    }

    /// Read options from JSON; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> StockResult<Self> {
        let config: StockConfig = serde_json::from_str(json)
            .map_err(|err| StockError::Config { reason: err.to_string() })?;
        let weights = config.weights.iter().map(|&w| Weight::new(w)).collect::<StockResult<_>>()?;
        Ok(StockOptions {
            variables: dedup(config.variables),
            weights: dedup_weights(weights),
            fill: Fill::from_f64(config.fill)?,
            extra_variables: dedup(config.extra_variables),
        })
    }

    pub fn from_file(path: &Path) -> StockResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| StockError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = fill;
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    pub fn fill(&self) -> Fill {
        self.fill
    }

    pub fn extra_variables(&self) -> &[String] {
        &self.extra_variables
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StockConfig {
    variables: Vec<String>,
    weights: Vec<f64>,
    fill: f64,
    extra_variables: Vec<String>,
}

impl Default for StockConfig {
    fn default() -> Self {
        StockConfig {
            variables: vec![DEFAULT_VARIABLE.to_string()],
            weights: vec![DEFAULT_WEIGHT],
            fill: DEFAULT_FILL as f64,
            extra_variables: Vec::new(),
        }
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn dedup_weights(weights: Vec<Weight>) -> Vec<Weight> {
    let mut out: Vec<Weight> = Vec::with_capacity(weights.len());
    for weight in weights {
        if !out.iter().any(|w| w.label == weight.label) {
            out.push(weight);
        }
    }
    out
}

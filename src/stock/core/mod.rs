//! core — panel containers, identity table, and the per-stage numerics.
//!
//! Purpose
//! -------
//! Collect the building blocks of the stock computation: the raw and
//! regularized panel containers, the historical identity table, option
//! types, column guards, and one module per pipeline stage. The pipeline
//! and output layers in [`crate::stock`] build on these primitives.
//!
//! Key behaviors
//! -------------
//! - Hold input data in [`RawPanel`] (columnar, unordered) and stage data in
//!   [`Panel`] (country-major, year-contiguous, with [`CountrySpan`] blocks).
//! - Expand the raw panel to full year coverage ([`expand_panel`]) and tag
//!   each row with its historical identity ([`IdentityTable::resolve_panel`]).
//! - Normalize and forward-fill indicators ([`normalize_and_fill`]), derive
//!   antecedent values ([`resolve_antecedent`]), and run the depreciation
//!   recurrence ([`accumulate_stock`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Missing values are `f64::NAN` in numeric columns and `None` in text
//!   columns.
//! - Every [`Panel`] row is addressed by a unique `(country_id, year)` key;
//!   rows of one country are contiguous and ordered by year with no gaps.
//! - Stage functions never mutate their inputs; each returns a new value
//!   row-aligned with the panel it was given.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule cover the stage in isolation on small
//!   hand-built panels. End-to-end behavior is exercised by
//!   `tests/integration_stock_pipeline.rs`.

pub mod accumulate;
pub mod antecedent;
pub mod expand;
pub mod identity;
pub mod normalize;
pub mod options;
pub mod panel;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::accumulate::{CountryStock, StockSeries, accumulate_country, accumulate_stock};
pub use self::antecedent::resolve_antecedent;
pub use self::expand::{ExpansionReport, expand_panel};
pub use self::identity::{
    BUILTIN_HISTORICAL_IDENTITY, ExcludedEntity, HistoricalIdentityRule, IdentityTable,
    LiteralOverride,
};
pub use self::normalize::{FilledIndicator, forward_fill, min_max_normalize, normalize_and_fill};
pub use self::options::{DEFAULT_FILL, DEFAULT_VARIABLE, DEFAULT_WEIGHT, Fill, StockOptions, Weight};
pub use self::panel::{Column, CountrySpan, DatasetProvider, Panel, RawPanel};
pub use self::validation::{MIN_DISTINCT_VALUES, check_cardinality, require_numeric};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use stock_index::stock::core::prelude::*;
//
// to import the containers and option types in a single line.

pub mod prelude {
    pub use super::identity::IdentityTable;
    pub use super::options::{Fill, StockOptions, Weight};
    pub use super::panel::{Column, DatasetProvider, Panel, RawPanel};
}

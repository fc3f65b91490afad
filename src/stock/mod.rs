//! stock — depreciation-weighted stock indices over a country-year panel.
//!
//! Purpose
//! -------
//! Turn a country-year panel of indicator values into, for each requested
//! indicator and depreciation weight, a country's accumulated "stock" of
//! that indicator: a geometrically discounted sum of past values in which
//! the years a country spent inside a predecessor polity are filled in from
//! that polity's shared history.
//!
//! Key behaviors
//! -------------
//! - [`core`] holds the containers, the historical identity table, and one
//!   module per stage (expand, identity, normalize, antecedent, accumulate).
//! - [`pipeline`] chains the stages; [`compute_stock`] is the one-call entry
//!   point and [`StockPipeline`] the reusable one with a custom table.
//! - [`output`] assembles the [`StockTable`] handed back to callers together
//!   with its [`PipelineReport`].
//! - [`errors`] centralizes [`StockError`] / [`StockResult`] and the
//!   non-fatal [`StockWarning`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Depreciation weights lie strictly in (0, 1) and the forward-fill
//!   horizon is a non-negative whole number of years; both are checked when
//!   [`StockOptions`] is built.
//! - Rescaled stock values lie in [0, 1] whenever they are present.
//! - A run is deterministic: the same inputs give bit-identical outputs
//!   regardless of the rayon thread count.
//!
//! Conventions
//! -----------
//! - Stock columns are named `{indicator}{label}_raw` and
//!   `{indicator}{label}`, where `label` is the weight's decimal rendering
//!   without its leading zero (`0.99` → `.99`).
//! - Logging goes through `tracing` under `stock_index::<stage>` targets; the
//!   crate installs no subscriber.
//!
//! Downstream usage
//! ----------------
//! - Build a [`RawPanel`] (or implement [`DatasetProvider`] for a type that
//!   owns one), then call [`compute_stock`] or
//!   `StockPipeline::new()?.run(&panel, &options)`.
//! - Options can be loaded from JSON via [`StockOptions::from_json_str`].
//!
//! Testing notes
//! -------------
//! - Stage-level unit tests live next to each module; full runs over
//!   synthetic panels live in `tests/integration_stock_pipeline.rs`.

pub mod core;
pub mod errors;
pub mod output;
pub mod pipeline;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    Column, DatasetProvider, Fill, IdentityTable, Panel, RawPanel, StockOptions, Weight,
};
pub use self::errors::{StockError, StockResult, StockWarning};
pub use self::output::{PipelineReport, StockColumns, StockTable};
pub use self::pipeline::{StockPipeline, compute_stock};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use stock_index::stock::prelude::*;
//
// to import the main stock surface in a single line.

pub mod prelude {
    pub use super::{
        Column, DatasetProvider, Fill, IdentityTable, PipelineReport, RawPanel, StockColumns,
        StockError, StockOptions, StockPipeline, StockResult, StockTable, StockWarning, Weight,
        compute_stock,
    };
}

//! Panel filter & expander.
//!
//! Purpose
//! -------
//! Turn the raw, possibly irregular input table into a regular [`Panel`]:
//! drop the fixed set of excluded entities, then give every remaining
//! country one row per year between its first and last observed year.
//!
//! Key behaviors
//! -------------
//! - Entities listed as excluded in the [`IdentityTable`] are removed and
//!   reported (`info` event plus [`ExpansionReport::excluded`]).
//! - Missing years inside a country's range are synthesized as all-missing
//!   rows with `is_original == false`.
//! - Only the requested columns are carried into the panel; an absent
//!   requested column fails with `StockError::UnknownVariable`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Input keys `(country_id, year)` must be unique; a repeat fails with
//!   `StockError::DuplicateObservation`.
//! - Countries are laid out in ascending `country_id`, years ascending.
//! - A country's name is taken from its most recent observed row.
use std::collections::BTreeMap;

use crate::stock::{
    core::{
        identity::IdentityTable,
        panel::{Column, CountrySpan, Panel, RawPanel},
        validation::require_column,
    },
    errors::{StockError, StockResult},
};

/// Side information produced while expanding a panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpansionReport {
    /// Excluded entities that were actually present, as `(country_id, name)`.
    pub excluded: Vec<(i64, String)>,
    /// Rows synthesized to close year gaps.
    pub synthesized_rows: usize,
}

/// Filter excluded entities and regularize year coverage.
///
/// Parameters
/// ----------
/// - `raw`: input panel from the dataset provider.
/// - `identity`: supplies the exclusion list.
/// - `columns`: names of the indicator and extra columns to carry along.
///
/// Returns
/// -------
/// The expanded [`Panel`] (with `country_id_hist` still equal to
/// `country_id`) and an [`ExpansionReport`].
///
/// Errors
/// ------
/// - `StockError::UnknownVariable` for a requested column not in `raw`.
/// - `StockError::DuplicateObservation` for a repeated `(country_id, year)`.
pub fn expand_panel(
    raw: &RawPanel, identity: &IdentityTable, columns: &[String],
) -> StockResult<(Panel, ExpansionReport)> {
    let sources = columns
        .iter()
        .map(|name| require_column(name, raw.column(name)).map(|col| (name.clone(), col)))
        .collect::<StockResult<Vec<_>>>()?;

    let mut by_country: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    let mut excluded: BTreeMap<i64, String> = BTreeMap::new();
    for (row, &country_id) in raw.country_id().iter().enumerate() {
        if identity.is_excluded(country_id) {
            excluded.entry(country_id).or_insert_with(|| raw.country_name()[row].clone());
        } else {
            by_country.entry(country_id).or_default().push(row);
        }
    }

    let mut spans = Vec::with_capacity(by_country.len());
    let mut gather: Vec<Option<usize>> = Vec::with_capacity(raw.len());
    let mut country_id = Vec::with_capacity(raw.len());
    let mut year = Vec::with_capacity(raw.len());
    let mut is_original = Vec::with_capacity(raw.len());

    for (&id, rows) in &mut by_country {
        rows.sort_by_key(|&row| raw.year()[row]);
        for pair in rows.windows(2) {
            if raw.year()[pair[0]] == raw.year()[pair[1]] {
                return Err(StockError::DuplicateObservation {
                    country_id: id,
                    year: raw.year()[pair[0]],
                });
            }
        }
        // Non-empty by construction of `by_country`.
        let (Some(&first), Some(&last)) = (rows.first(), rows.last()) else { continue };
        let first_year = raw.year()[first];
        let last_year = raw.year()[last];

        let start = gather.len();
        let mut observed = rows.iter().peekable();
        for y in first_year..=last_year {
            let source = match observed.peek() {
                Some(&&row) if raw.year()[row] == y => {
                    observed.next();
                    Some(row)
                }
                _ => None,
            };
            gather.push(source);
            country_id.push(id);
            year.push(y);
            is_original.push(source.is_some());
        }
        spans.push(CountrySpan {
            country_id: id,
            country_name: raw.country_name()[last].clone(),
            start,
            len: gather.len() - start,
            first_year,
        });
    }

    let columns: BTreeMap<String, Column> =
        sources.into_iter().map(|(name, col)| (name, col.gather(&gather))).collect();

    let synthesized_rows = is_original.iter().filter(|&&orig| !orig).count();
    let report = ExpansionReport { excluded: excluded.into_iter().collect(), synthesized_rows };

    if !report.excluded.is_empty() {
        let ids: Vec<i64> = report.excluded.iter().map(|(id, _)| *id).collect();
        tracing::info!(
            target: "stock_index::panel",
            count = ids.len(),
            excluded = ?ids,
            "panel.countries.excluded"
        );
    }
    tracing::debug!(
        target: "stock_index::panel",
        countries = spans.len(),
        rows = year.len(),
        synthesized = synthesized_rows,
        "panel.expanded"
    );

    let country_id_hist = country_id.clone();
    let panel = Panel { spans, country_id, year, is_original, country_id_hist, columns };
    Ok((panel, report))
}

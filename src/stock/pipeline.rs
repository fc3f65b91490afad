//! Stock pipeline — end-to-end orchestration.
//!
//! Purpose
//! -------
//! Thread an input panel through every stage, in order, passing each
//! stage's output explicitly to the next:
//!
//! 1. filter & expand ([`expand_panel`]),
//! 2. resolve historical identities ([`IdentityTable::resolve_panel`]),
//! 3. normalize & forward-fill ([`normalize_and_fill`]),
//! 4. resolve antecedents ([`resolve_antecedent`]),
//! 5. accumulate stocks ([`accumulate_stock`]),
//! 6. assemble the output ([`assemble`]).
//!
//! Key behaviors
//! -------------
//! - [`StockPipeline`] owns the read-only identity table; [`compute_stock`]
//!   is the convenience entry point using the builtin table.
//! - The raw dataset is only borrowed for expansion; nothing from a run is
//!   kept once the [`StockTable`] is returned.
//! - The first validation error aborts the run; per-country degeneracies
//!   (no start year, no observations) yield missing values instead.
use std::sync::Arc;

use crate::stock::{
    core::{
        accumulate::accumulate_stock,
        antecedent::resolve_antecedent,
        expand::expand_panel,
        identity::IdentityTable,
        normalize::normalize_and_fill,
        options::StockOptions,
        panel::DatasetProvider,
    },
    errors::{StockError, StockResult},
    output::{PipelineReport, StockTable, assemble},
};

/// StockPipeline — runs the stock computation against an identity table.
#[derive(Debug, Clone)]
pub struct StockPipeline {
    identity: Arc<IdentityTable>,
}

impl StockPipeline {
    /// Pipeline backed by the builtin identity table.
    pub fn new() -> StockResult<Self> {
        Ok(StockPipeline { identity: IdentityTable::builtin()? })
    }

    /// Pipeline backed by a caller-supplied identity table.
    pub fn with_identity_table(identity: Arc<IdentityTable>) -> Self {
        StockPipeline { identity }
    }

    pub fn identity(&self) -> &IdentityTable {
        &self.identity
    }

    /// Compute the stock table for `options` over the provider's panel.
    ///
    /// Errors
    /// ------
    /// - `StockError::MissingDataset` when the provider yields no panel.
    /// - `StockError::UnknownVariable` / `StockError::NonNumericVariable`
    ///   for requested columns.
    /// - `StockError::DuplicateObservation` for repeated input keys.
    pub fn run<P>(&self, provider: &P, options: &StockOptions) -> StockResult<StockTable>
    where
        P: DatasetProvider + ?Sized,
    {
        let raw = provider.dataset().ok_or(StockError::MissingDataset)?;
        tracing::info!(
            target: "stock_index::pipeline",
            rows = raw.len(),
            variables = ?options.variables(),
            weights = ?options.weights().iter().map(|w| w.value()).collect::<Vec<_>>(),
            fill = options.fill().years(),
            "pipeline.start"
        );

        let mut requested: Vec<String> = options.variables().to_vec();
        for extra in options.extra_variables() {
            if !requested.contains(extra) {
                requested.push(extra.clone());
            }
        }

        let (panel, expansion) = expand_panel(raw, &self.identity, &requested)?;
        let panel = self.identity.resolve_panel(panel);

        let mut warnings = Vec::new();
        let mut antecedents = Vec::with_capacity(options.variables().len());
        for variable in options.variables() {
            let (filled, warning) = normalize_and_fill(&panel, variable, options.fill())?;
            warnings.extend(warning);
            antecedents.push(resolve_antecedent(&panel, &filled.filled, &self.identity));
        }

        let mut series = Vec::with_capacity(options.variables().len() * options.weights().len());
        for (variable, antecedent) in options.variables().iter().zip(&antecedents) {
            for weight in options.weights() {
                let stock = accumulate_stock(&panel, variable, antecedent, weight)?;
                series.push((variable.clone(), weight.clone(), stock));
            }
        }

        let report = PipelineReport::new(expansion, warnings);
        let table = assemble(&panel, options.extra_variables(), series, report);
        tracing::info!(
            target: "stock_index::pipeline",
            rows = table.len(),
            stocks = table.stocks.len(),
            warnings = table.report.warnings.len(),
            "pipeline.done"
        );
        Ok(table)
    }
}

/// Compute stocks with the builtin identity table.
///
/// Parameters
/// ----------
/// - `provider`: source of the raw panel.
/// - `variables`: indicator columns (see [`StockOptions`] for defaults).
/// - `weights`: depreciation weights, each in (0, 1).
/// - `fill`: forward-fill horizon, `≥ 0`.
/// - `extra_variables`: columns copied to the output.
///
/// Errors
/// ------
/// - `StockError::InvalidWeight` / `StockError::InvalidFill` before any
///   data is read; otherwise as [`StockPipeline::run`].
pub fn compute_stock<P>(
    provider: &P, variables: &[String], weights: &[f64], fill: i64, extra_variables: &[String],
) -> StockResult<StockTable>
where
    P: DatasetProvider + ?Sized,
{
    let options =
        StockOptions::new(variables.to_vec(), weights, fill, extra_variables.to_vec())?;
    StockPipeline::new()?.run(provider, &options)
}

//! Historical identity table and resolver.
//!
//! Purpose
//! -------
//! Load the declarative table that maps (country, year range) to the
//! predecessor polity a country inherits its history from, and attach the
//! resulting `country_id_hist` to every row of an expanded [`Panel`].
//!
//! Key behaviors
//! -------------
//! - [`IdentityTable`] is deserialized from JSON (builtin artifact embedded
//!   with `include_str!`, or a caller-supplied document). Besides the ordered
//!   rules it carries the entity exclusion list, the `changed` set of shared
//!   predecessor identifiers, and the literal antecedent overrides.
//! - [`IdentityTable::resolve_panel`] applies the rules of each country in
//!   table order; a later rule overwrites an earlier one on overlapping
//!   years. Rows no rule covers keep `country_id_hist == country_id`.
//! - [`IdentityTable::overlaps`] lists rule pairs whose ranges intersect so
//!   table authors can audit precedence.
//!
//! Invariants & assumptions
//! ------------------------
//! - Rule order is data: it is preserved exactly as written in the document.
//! - `year_start <= year_end` for every rule and override; enforced at load.
//! - The table is immutable after load and shared read-only across workers.
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::Arc,
};

use rayon::prelude::*;
use serde::Deserialize;

use crate::stock::{
    core::panel::Panel,
    errors::{StockError, StockResult},
};

pub const BUILTIN_HISTORICAL_IDENTITY: &str =
    include_str!("../../../data/historical_identity.json");

/// One historical identity rule: `country_id` belongs to `predecessor_id`
/// for every year in `[year_start, year_end]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoricalIdentityRule {
    pub country_id: i64,
    pub year_start: i32,
    pub year_end: i32,
    pub predecessor_id: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl HistoricalIdentityRule {
    pub fn covers(&self, year: i32) -> bool {
        self.year_start <= year && year <= self.year_end
    }
}

/// Entity removed from the panel before expansion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExcludedEntity {
    pub country_id: i64,
    #[serde(default)]
    pub name: String,
}

/// Literal antecedent override applied after group means.
///
/// - `CarryForward`: each year in the window takes the previous year's
///   antecedent value of the same country (documented colonial gaps).
/// - `GroupMean`: each year in the window, every listed country takes the
///   mean antecedent value of the group (shared administration).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiteralOverride {
    CarryForward {
        country_id: i64,
        year_start: i32,
        year_end: i32,
        #[serde(default)]
        note: Option<String>,
    },
    GroupMean {
        country_ids: Vec<i64>,
        year_start: i32,
        year_end: i32,
        #[serde(default)]
        note: Option<String>,
    },
}

impl LiteralOverride {
    fn window(&self) -> (i32, i32) {
        match self {
            LiteralOverride::CarryForward { year_start, year_end, .. }
            | LiteralOverride::GroupMean { year_start, year_end, .. } => (*year_start, *year_end),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct IdentityDocument {
    version: u32,
    excluded: Vec<ExcludedEntity>,
    rules: Vec<HistoricalIdentityRule>,
    changed: Vec<i64>,
    overrides: Vec<LiteralOverride>,
}

/// IdentityTable — ordered historical identity rules plus related lists.
///
/// Purpose
/// -------
/// Hold every fixed, rule-author-defined artifact the pipeline consults:
/// the exclusion list (panel filter), the ordered identity rules (identity
/// resolver), and the `changed` set and literal overrides (antecedent
/// resolver).
///
/// Fields
/// ------
/// - `rules`: rules in document order.
/// - `by_country`: per-country indices into `rules`, ascending, i.e. the
///   interval list of each country in evaluation order.
/// - `excluded`, `changed`, `overrides`: as loaded.
///
/// Notes
/// -----
/// - Construct through [`IdentityTable::builtin`],
///   [`IdentityTable::from_json_str`] or [`IdentityTable::from_file`];
///   all three validate year windows.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityTable {
    version: u32,
    rules: Vec<HistoricalIdentityRule>,
    by_country: BTreeMap<i64, Vec<usize>>,
    excluded: Vec<ExcludedEntity>,
    changed: BTreeSet<i64>,
    overrides: Vec<LiteralOverride>,
}

impl IdentityTable {
    /// Parse the builtin table shipped with the crate.
    pub fn builtin() -> StockResult<Arc<Self>> {
        Self::from_json_str(BUILTIN_HISTORICAL_IDENTITY).map(Arc::new)
    }

    pub fn from_json_str(json: &str) -> StockResult<Self> {
        let document: IdentityDocument = serde_json::from_str(json)
            .map_err(|err| StockError::IdentityTable { reason: err.to_string() })?;
        Self::from_document(document)
    }

    pub fn from_file(path: &Path) -> StockResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| StockError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    fn from_document(document: IdentityDocument) -> StockResult<Self> {
        for rule in &document.rules {
            if rule.year_start > rule.year_end {
                return Err(StockError::IdentityTable {
                    reason: format!(
                        "rule for country {} has year_start {} after year_end {}",
                        rule.country_id, rule.year_start, rule.year_end
                    ),
                });
            }
        }
        for entry in &document.overrides {
            let (start, end) = entry.window();
            if start > end {
                return Err(StockError::IdentityTable {
                    reason: format!("override window {start}..={end} is empty"),
                });
            }
            if let LiteralOverride::GroupMean { country_ids, .. } = entry {
                if country_ids.is_empty() {
                    return Err(StockError::IdentityTable {
                        reason: format!("group override {start}..={end} names no countries"),
                    });
                }
            }
        }

        let mut by_country: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, rule) in document.rules.iter().enumerate() {
            by_country.entry(rule.country_id).or_default().push(idx);
        }

        let table = IdentityTable {
            version: document.version,
            rules: document.rules,
            by_country,
            excluded: document.excluded,
            changed: document.changed.into_iter().collect(),
            overrides: document.overrides,
        };

        let overlaps = table.overlaps();
        if !overlaps.is_empty() {
            tracing::debug!(
                target: "stock_index::identity",
                overlaps = overlaps.len(),
                "identity.rules.overlap_resolved_by_order"
            );
        }
        tracing::debug!(
            target: "stock_index::identity",
            version = table.version,
            rules = table.rules.len(),
            countries = table.by_country.len(),
            "identity.table.loaded"
        );
        Ok(table)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[HistoricalIdentityRule] {
        &self.rules
    }

    pub fn excluded(&self) -> &[ExcludedEntity] {
        &self.excluded
    }

    pub fn is_excluded(&self, country_id: i64) -> bool {
        self.excluded.iter().any(|entity| entity.country_id == country_id)
    }

    pub fn changed(&self) -> &BTreeSet<i64> {
        &self.changed
    }

    pub fn overrides(&self) -> &[LiteralOverride] {
        &self.overrides
    }

    /// Rules of one country, in evaluation order.
    pub fn rules_for(&self, country_id: i64) -> impl Iterator<Item = &HistoricalIdentityRule> {
        self.by_country
            .get(&country_id)
            .into_iter()
            .flat_map(move |indices| indices.iter().map(move |&idx| &self.rules[idx]))
    }

    /// Historical identifier of `country_id` in `year`.
    ///
    /// Equivalent to applying every rule in order and keeping the last
    /// assignment; falls back to `country_id` when no rule covers the year.
    pub fn resolve(&self, country_id: i64, year: i32) -> i64 {
        self.by_country
            .get(&country_id)
            .and_then(|indices| {
                indices.iter().rev().map(|&idx| &self.rules[idx]).find(|rule| rule.covers(year))
            })
            .map_or(country_id, |rule| rule.predecessor_id)
    }

    /// Pairs `(earlier, later)` of rule indices for the same country whose
    /// year ranges intersect. The later rule takes precedence.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for indices in self.by_country.values() {
            for (pos, &earlier) in indices.iter().enumerate() {
                for &later in &indices[pos + 1..] {
                    let a = &self.rules[earlier];
                    let b = &self.rules[later];
                    if a.year_start <= b.year_end && b.year_start <= a.year_end {
                        pairs.push((earlier, later));
                    }
                }
            }
        }
        pairs
    }

    /// Populate `country_id_hist` for every row of `panel`.
    ///
    /// Countries are resolved independently; each country's rules are
    /// written over its year block in table order so overlapping rules
    /// resolve to the later one.
    pub fn resolve_panel(&self, panel: Panel) -> Panel {
        let blocks: Vec<Vec<i64>> = panel
            .spans()
            .par_iter()
            .map(|span| {
                let mut hist = vec![span.country_id; span.len];
                for rule in self.rules_for(span.country_id) {
                    let from = rule.year_start.max(span.first_year);
                    let to = rule.year_end.min(span.last_year());
                    for year in from..=to {
                        hist[(year - span.first_year) as usize] = rule.predecessor_id;
                    }
                }
                hist
            })
            .collect();

        let country_id_hist: Vec<i64> = blocks.into_iter().flatten().collect();
        let remapped = country_id_hist
            .iter()
            .zip(panel.country_id())
            .filter(|(hist, id)| hist != id)
            .count();
        tracing::debug!(
            target: "stock_index::identity",
            rows = country_id_hist.len(),
            remapped,
            "identity.panel.resolved"
        );
        panel.with_country_id_hist(country_id_hist)
    }
}

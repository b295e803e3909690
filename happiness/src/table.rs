use std::sync::Arc;

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::catalog::MetricCatalog;

/// Where the `Rank` column of a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankSource {
    /// The source file carried a `Rank` column.
    Provided,
    /// The loader ranked each year's cohort by `Ladder Score`.
    Derived,
}

/// Optional columns a loaded table may or may not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub rank: RankSource,
    pub position_changes: bool,
}

/// The normalised, immutable happiness table together with the catalogs derived from it.
///
/// Invariants established by the loader:
/// * every (country, year) pair appears at most once
/// * `Year` is an `Int32` column holding whole years only
/// * `countries` is sorted and duplicate free, `years` ascending and duplicate free
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    pub(crate) df: DataFrame,
    pub(crate) countries: Vec<String>,
    pub(crate) years: Vec<i32>,
    pub(crate) catalog: Arc<MetricCatalog>,
    pub(crate) capabilities: Capabilities,
}

impl CanonicalTable {
    /// Get access to the underlying data frame
    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Names of the selectable metrics, in catalog order.
    pub fn metrics(&self) -> Vec<&'static str> {
        self.catalog.names()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

impl PartialEq for CanonicalTable {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
            && self.countries == other.countries
            && self.years == other.years
            && self.catalog == other.catalog
            && self.capabilities == other.capabilities
    }
}

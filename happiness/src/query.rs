//! Types and functions that derive dashboard views from the canonical table. Every operation is a
//! pure function of the table (or a slice of it) and its parameters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use itertools::{izip, Itertools};
use log::debug;
use nonempty::NonEmpty;
use polars::lazy::dsl::{col, lit, Expr};
use polars::prelude::{
    ChunkAgg, DataFrame, DataType, Float64Chunked, IntoLazy, NamedFrom, Series,
    SortMultipleOptions,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{BetterDirection, MetricCatalog},
    error::{HappinessError, HappinessResult},
    table::CanonicalTable,
    COL,
};

/// Spelling of the "every country" choice offered by country pickers.
pub const ALL_COUNTRIES: &str = "All";

/// Which countries a view covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CountrySelection {
    All,
    Only(NonEmpty<String>),
}

impl CountrySelection {
    /// Build a selection from picker values. Choosing `ALL_COUNTRIES` (in any case), or nothing at
    /// all, selects every country.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(ALL_COUNTRIES))
        {
            return Self::All;
        }
        match NonEmpty::from_vec(names) {
            Some(names) => Self::Only(names),
            None => Self::All,
        }
    }
}

impl From<&CountrySelection> for Option<Expr> {
    fn from(value: &CountrySelection) -> Self {
        match value {
            CountrySelection::All => None,
            CountrySelection::Only(names) => {
                let names = Series::new("countries", names.iter().cloned().collect_vec());
                Some(col(COL::COUNTRY).is_in(lit(names)))
            }
        }
    }
}

/// Search over years
#[derive(PartialEq, Eq, Clone, Debug, Deserialize, Serialize)]
pub enum YearRange {
    Before(u16),
    After(u16),
    Between(u16, u16),
}

impl FromStr for YearRange {
    type Err = HappinessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HappinessError::InvalidSearchQuery(format!("Invalid year range: {s}"));
        let parts: Vec<Option<u16>> = s
            .split("...")
            .map(|value| {
                if value.is_empty() {
                    Ok(None)
                } else {
                    value.parse::<u16>().map(Some).map_err(|_| invalid())
                }
            })
            .collect::<Result<Vec<Option<u16>>, _>>()?;
        match parts.as_slice() {
            [Some(a)] => Ok(YearRange::Between(*a, *a)),
            [None, Some(a)] => Ok(YearRange::Before(*a)),
            [Some(a), None] => Ok(YearRange::After(*a)),
            [Some(a), Some(b)] if a <= b => Ok(YearRange::Between(*a, *b)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearRange::Before(year) => write!(f, "...{year}"),
            YearRange::After(year) => write!(f, "{year}..."),
            YearRange::Between(start, end) if start == end => write!(f, "{start}"),
            YearRange::Between(start, end) => write!(f, "{start}...{end}"),
        }
    }
}

impl From<&YearRange> for Expr {
    fn from(value: &YearRange) -> Self {
        match value {
            YearRange::Before(year) => col(COL::YEAR).lt_eq(lit(i32::from(*year))),
            YearRange::After(year) => col(COL::YEAR).gt_eq(lit(i32::from(*year))),
            YearRange::Between(start, end) => col(COL::YEAR)
                .gt_eq(lit(i32::from(*start)))
                .and(col(COL::YEAR).lt_eq(lit(i32::from(*end)))),
        }
    }
}

/// Combine multiple queries with OR. If there are no queries in the input list, returns None.
fn combine_exprs_with_or(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|query, expr| query.or(expr))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum MatchType {
    Regex,
    #[default]
    Exact,
    Contains,
    Startswith,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum CaseSensitivity {
    #[default]
    Insensitive,
    Sensitive,
}

/// Build the regex a country name must match. Anything but `MatchType::Regex` is escaped so the
/// text is matched literally.
fn country_pattern(value: &str, match_type: MatchType, case_sensitivity: CaseSensitivity) -> String {
    let pattern = match match_type {
        MatchType::Regex => value.to_string(),
        MatchType::Exact => format!("^{}$", regex::escape(value)),
        MatchType::Contains => regex::escape(value),
        MatchType::Startswith => format!("^{}", regex::escape(value)),
    };
    match case_sensitivity {
        CaseSensitivity::Insensitive => format!("(?i){pattern}"),
        CaseSensitivity::Sensitive => pattern,
    }
}

/// One value of a metric for one country in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub country: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// One point of a correlation scatter, sized by the country's ladder score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub country: String,
    pub x: f64,
    pub y: f64,
    pub size_hint: f64,
}

/// Best and worst records of a slice. `top` is ordered best first, `bottom` worst first.
#[derive(Debug, Clone)]
pub struct TopBottom {
    pub top: RecordSet,
    pub bottom: RecordSet,
}

/// Pearson correlation of the pairs' `x` and `y`. `None` when there are fewer than two pairs or
/// either side has no variance.
pub fn pearson(pairs: &[CorrelationPair]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for pair in pairs {
        let (dx, dy) = (pair.x - mean_x, pair.y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// A filtered subset of the canonical table. It keeps a handle on the metric catalog so that
/// aggregates can validate metric names and look up their direction.
#[derive(Debug, Clone)]
pub struct RecordSet {
    df: DataFrame,
    catalog: Arc<MetricCatalog>,
}

impl RecordSet {
    pub(crate) fn new(df: DataFrame, catalog: Arc<MetricCatalog>) -> Self {
        Self { df, catalog }
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    fn filter(&self, expr: Option<Expr>) -> HappinessResult<RecordSet> {
        let df = match expr {
            Some(expr) => self.df.clone().lazy().filter(expr).collect()?,
            None => self.df.clone(),
        };
        Ok(Self::new(df, Arc::clone(&self.catalog)))
    }

    /// Values of `metric` as floats, in record order.
    fn metric_column(&self, metric: &str) -> HappinessResult<Float64Chunked> {
        self.catalog.get(metric)?;
        Ok(self
            .df
            .column(metric)?
            .cast(&DataType::Float64)?
            .f64()?
            .clone())
    }

    /// Countries in record order, first occurrence only.
    pub fn countries(&self) -> HappinessResult<Vec<String>> {
        Ok(self
            .df
            .column(COL::COUNTRY)?
            .str()?
            .into_iter()
            .flatten()
            .unique()
            .map(str::to_string)
            .collect())
    }

    pub fn slice_by_countries(&self, selection: &CountrySelection) -> HappinessResult<RecordSet> {
        self.filter(selection.into())
    }

    /// Every record's value of `metric`, in record order.
    pub fn values(&self, metric: &str) -> HappinessResult<Vec<MetricValue>> {
        let values = self.metric_column(metric)?;
        Ok(izip!(
            self.df.column(COL::COUNTRY)?.str()?,
            self.df.column(COL::YEAR)?.i32()?,
            &values
        )
        .filter_map(|(country, year, value)| {
            Some(MetricValue {
                country: country?.to_string(),
                year: year?,
                value,
            })
        })
        .collect())
    }

    /// Values of `metric` grouped by country (alphabetically) and ordered by ascending year within
    /// each country.
    pub fn metric_series(&self, metric: &str) -> HappinessResult<Vec<MetricValue>> {
        self.catalog.get(metric)?;
        let sorted = self.df.sort(
            [COL::COUNTRY, COL::YEAR],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;
        Self::new(sorted, Arc::clone(&self.catalog)).values(metric)
    }

    /// Arithmetic mean of `metric`. Missing values are skipped; a slice without any value is an
    /// error rather than zero or NaN.
    pub fn global_average(&self, metric: &str) -> HappinessResult<f64> {
        let values = self.metric_column(metric)?;
        if self.is_empty() {
            return Err(HappinessError::EmptyInput(format!(
                "average of '{metric}' over an empty record set"
            )));
        }
        values.mean().ok_or_else(|| {
            HappinessError::EmptyInput(format!("no values of '{metric}' in the record set"))
        })
    }

    /// Top and bottom `n` records by `metric`, in the metric's catalog direction.
    pub fn top_bottom_n(&self, metric: &str, n: usize) -> HappinessResult<TopBottom> {
        let direction = self.catalog.get(metric)?.direction;
        self.top_bottom_n_by(metric, n, direction)
    }

    /// Top and bottom `n` records by `metric`. Sorting is stable, so equal values keep record order.
    /// Fewer than `n` ranked records yields as many as are available; records missing the metric
    /// are not ranked.
    pub fn top_bottom_n_by(
        &self,
        metric: &str,
        n: usize,
        direction: BetterDirection,
    ) -> HappinessResult<TopBottom> {
        self.catalog.get(metric)?;
        let ranked = self
            .df
            .clone()
            .lazy()
            .filter(col(metric).is_not_null())
            .collect()?;
        let sorted = |descending: bool| {
            ranked.sort(
                [metric],
                SortMultipleOptions::default()
                    .with_order_descending(descending)
                    .with_maintain_order(true),
            )
        };
        let higher_is_better = direction == BetterDirection::HigherIsBetter;
        let best_first = sorted(higher_is_better)?;
        let worst_first = sorted(!higher_is_better)?;
        debug!(
            "Ranked {} of {} records by '{metric}' ({direction})",
            ranked.height(),
            self.len()
        );
        Ok(TopBottom {
            top: Self::new(best_first.head(Some(n)), Arc::clone(&self.catalog)),
            bottom: Self::new(worst_first.head(Some(n)), Arc::clone(&self.catalog)),
        })
    }

    /// Pairs of (`metric_x`, `metric_y`) per record, sized by ladder score. Records missing any of
    /// the three values are left out.
    pub fn correlation_pairs(
        &self,
        metric_x: &str,
        metric_y: &str,
    ) -> HappinessResult<Vec<CorrelationPair>> {
        self.catalog.get(metric_x)?;
        self.catalog.get(metric_y)?;
        let complete = self
            .df
            .clone()
            .lazy()
            .filter(
                col(metric_x)
                    .is_not_null()
                    .and(col(metric_y).is_not_null())
                    .and(col(COL::LADDER_SCORE).is_not_null()),
            )
            .collect()?;
        let complete = Self::new(complete, Arc::clone(&self.catalog));
        let xs = complete.metric_column(metric_x)?;
        let ys = complete.metric_column(metric_y)?;
        let sizes = complete.metric_column(COL::LADDER_SCORE)?;
        Ok(izip!(
            complete.df.column(COL::COUNTRY)?.str()?,
            &xs,
            &ys,
            &sizes
        )
        .filter_map(|(country, x, y, size_hint)| {
            Some(CorrelationPair {
                country: country?.to_string(),
                x: x?,
                y: y?,
                size_hint: size_hint?,
            })
        })
        .collect())
    }

    /// Records that beat this record set's average of `metric`, in the metric's catalog direction.
    pub fn above_average(&self, metric: &str) -> HappinessResult<RecordSet> {
        let direction = self.catalog.get(metric)?.direction;
        self.above_average_by(metric, direction)
    }

    /// Records whose `metric` is strictly better than the record set's average: greater for
    /// `HigherIsBetter`, smaller for `LowerIsBetter`.
    pub fn above_average_by(
        &self,
        metric: &str,
        direction: BetterDirection,
    ) -> HappinessResult<RecordSet> {
        let average = self.global_average(metric)?;
        let value = col(metric).cast(DataType::Float64);
        let expr = match direction {
            BetterDirection::HigherIsBetter => value.gt(lit(average)),
            BetterDirection::LowerIsBetter => value.lt(lit(average)),
        };
        self.filter(Some(expr))
    }
}

impl CanonicalTable {
    /// The whole table as a record set.
    pub fn all_records(&self) -> RecordSet {
        RecordSet::new(self.df.clone(), Arc::clone(&self.catalog))
    }

    /// Records of a single year. A year the table does not hold yields an empty set.
    pub fn slice_by_year(&self, year: i32) -> HappinessResult<RecordSet> {
        debug!("Slicing year {year}");
        self.all_records()
            .filter(Some(col(COL::YEAR).eq(lit(year))))
    }

    /// Records whose year falls in any of `ranges`. No ranges means no restriction.
    pub fn slice_by_year_range(&self, ranges: &[YearRange]) -> HappinessResult<RecordSet> {
        let exprs: Vec<Expr> = ranges.iter().map(Expr::from).collect();
        self.all_records().filter(combine_exprs_with_or(exprs))
    }

    pub fn slice_by_countries(&self, selection: &CountrySelection) -> HappinessResult<RecordSet> {
        self.all_records().slice_by_countries(selection)
    }

    /// Trend-line data: `metric` for the selected countries, ordered by year within each country.
    pub fn metric_series(
        &self,
        selection: &CountrySelection,
        metric: &str,
    ) -> HappinessResult<Vec<MetricValue>> {
        self.catalog.get(metric)?;
        self.slice_by_countries(selection)?.metric_series(metric)
    }

    /// Country names matching `text`.
    pub fn search_countries(
        &self,
        text: &str,
        match_type: MatchType,
        case_sensitivity: CaseSensitivity,
    ) -> HappinessResult<Vec<&str>> {
        let pattern = country_pattern(text, match_type, case_sensitivity);
        let regex =
            Regex::new(&pattern).map_err(|e| HappinessError::InvalidSearchQuery(e.to_string()))?;
        Ok(self
            .countries
            .iter()
            .map(String::as_str)
            .filter(|country| regex.is_match(country))
            .collect())
    }
}

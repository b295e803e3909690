use polars::prelude::{DataFrame, NamedFrom, Series};
use serde::{Deserialize, Serialize};

use crate::{
    error::HappinessResult,
    query::{pearson, CorrelationPair, CountrySelection, MetricValue, YearRange},
    table::CanonicalTable,
    COL,
};

/// A serialisable description of one dashboard view, e.g.
///
/// ```json
/// {"view": "topBottom", "year": 2021, "metric": "Rank", "n": 5}
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ViewRequest {
    /// Choropleth data: one value per country for a year.
    Map { year: i32, metric: String },
    /// Trend lines for a set of countries.
    Trend {
        #[serde(default = "all_countries")]
        countries: CountrySelection,
        metric: String,
        #[serde(default)]
        years: Vec<String>,
    },
    /// Scatter of two metrics for a year, sized by ladder score.
    #[serde(rename_all = "camelCase")]
    Correlation {
        year: i32,
        metric_x: String,
        metric_y: String,
    },
    /// Best and worst countries of a year.
    TopBottom {
        year: i32,
        #[serde(default)]
        metric: Option<String>,
        #[serde(default)]
        n: Option<usize>,
    },
    /// A year's global average with each country placed against it.
    GlobalAverage { year: i32, metric: String },
}

fn all_countries() -> CountrySelection {
    CountrySelection::All
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ContextRow {
    pub country: String,
    pub value: Option<f64>,
    pub above_average: bool,
}

/// The evaluated result of a `ViewRequest`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum View {
    Map {
        year: i32,
        metric: String,
        values: Vec<MetricValue>,
    },
    Trend {
        metric: String,
        series: Vec<MetricValue>,
    },
    #[serde(rename_all = "camelCase")]
    Correlation {
        year: i32,
        metric_x: String,
        metric_y: String,
        pairs: Vec<CorrelationPair>,
        coefficient: Option<f64>,
    },
    TopBottom {
        year: i32,
        metric: String,
        top: Vec<MetricValue>,
        bottom: Vec<MetricValue>,
    },
    GlobalAverage {
        year: i32,
        metric: String,
        average: f64,
        rows: Vec<ContextRow>,
    },
}

impl ViewRequest {
    pub fn evaluate(&self, table: &CanonicalTable, default_n: usize) -> HappinessResult<View> {
        let view = match self {
            ViewRequest::Map { year, metric } => View::Map {
                year: *year,
                metric: metric.clone(),
                values: table.slice_by_year(*year)?.values(metric)?,
            },
            ViewRequest::Trend {
                countries,
                metric,
                years,
            } => {
                let ranges = years
                    .iter()
                    .map(|range| range.parse::<YearRange>())
                    .collect::<Result<Vec<_>, _>>()?;
                let series = table
                    .slice_by_year_range(&ranges)?
                    .slice_by_countries(countries)?
                    .metric_series(metric)?;
                View::Trend {
                    metric: metric.clone(),
                    series,
                }
            }
            ViewRequest::Correlation {
                year,
                metric_x,
                metric_y,
            } => {
                let pairs = table
                    .slice_by_year(*year)?
                    .correlation_pairs(metric_x, metric_y)?;
                View::Correlation {
                    year: *year,
                    metric_x: metric_x.clone(),
                    metric_y: metric_y.clone(),
                    coefficient: pearson(&pairs),
                    pairs,
                }
            }
            ViewRequest::TopBottom { year, metric, n } => {
                // Every loaded table carries a rank, provided or derived
                let metric = metric.clone().unwrap_or_else(|| COL::RANK.to_string());
                let result = table
                    .slice_by_year(*year)?
                    .top_bottom_n(&metric, n.unwrap_or(default_n))?;
                View::TopBottom {
                    year: *year,
                    top: result.top.values(&metric)?,
                    bottom: result.bottom.values(&metric)?,
                    metric,
                }
            }
            ViewRequest::GlobalAverage { year, metric } => {
                let slice = table.slice_by_year(*year)?;
                let average = slice.global_average(metric)?;
                let above = slice.above_average(metric)?.countries()?;
                let rows = slice
                    .values(metric)?
                    .into_iter()
                    .map(|value| ContextRow {
                        above_average: above.contains(&value.country),
                        country: value.country,
                        value: value.value,
                    })
                    .collect();
                View::GlobalAverage {
                    year: *year,
                    metric: metric.clone(),
                    average,
                    rows,
                }
            }
        };
        Ok(view)
    }
}

/// Country, year and value columns for a list of metric values.
fn values_columns(values: &[&MetricValue], metric: &str) -> Vec<Series> {
    vec![
        Series::new(
            COL::COUNTRY,
            values.iter().map(|v| v.country.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(COL::YEAR, values.iter().map(|v| v.year).collect::<Vec<_>>()),
        Series::new(metric, values.iter().map(|v| v.value).collect::<Vec<_>>()),
    ]
}

impl View {
    /// Flatten the view into one row per plotted point, for tabular output.
    pub fn to_df(&self) -> HappinessResult<DataFrame> {
        let columns = match self {
            View::Map { metric, values, .. } => {
                values_columns(&values.iter().collect::<Vec<_>>(), metric)
            }
            View::Trend { metric, series } => {
                values_columns(&series.iter().collect::<Vec<_>>(), metric)
            }
            View::Correlation {
                metric_x,
                metric_y,
                pairs,
                ..
            } => vec![
                Series::new(
                    COL::COUNTRY,
                    pairs.iter().map(|p| p.country.as_str()).collect::<Vec<_>>(),
                ),
                Series::new(
                    &format!("{metric_x} (x)"),
                    pairs.iter().map(|p| p.x).collect::<Vec<_>>(),
                ),
                Series::new(
                    &format!("{metric_y} (y)"),
                    pairs.iter().map(|p| p.y).collect::<Vec<_>>(),
                ),
                Series::new(
                    COL::LADDER_SCORE,
                    pairs.iter().map(|p| p.size_hint).collect::<Vec<_>>(),
                ),
            ],
            View::TopBottom {
                metric,
                top,
                bottom,
                ..
            } => {
                let groups = std::iter::repeat("top")
                    .take(top.len())
                    .chain(std::iter::repeat("bottom").take(bottom.len()))
                    .collect::<Vec<_>>();
                let mut columns = vec![Series::new("Group", groups)];
                columns.extend(values_columns(
                    &top.iter().chain(bottom).collect::<Vec<_>>(),
                    metric,
                ));
                columns
            }
            View::GlobalAverage {
                year, metric, rows, ..
            } => vec![
                Series::new(
                    COL::COUNTRY,
                    rows.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(),
                ),
                Series::new(COL::YEAR, vec![*year; rows.len()]),
                Series::new(metric, rows.iter().map(|r| r.value).collect::<Vec<_>>()),
                Series::new(
                    "Above average",
                    rows.iter().map(|r| r.above_average).collect::<Vec<_>>(),
                ),
            ],
        };
        Ok(DataFrame::new(columns)?)
    }
}

//! The metric catalog: which columns can be compared, mapped and correlated, and which way is
//! "better" for each of them.

use serde::Serialize;
use strum_macros::Display;

use crate::{
    error::{HappinessError, HappinessResult},
    COL,
};

/// Whether a larger or a smaller value of a metric is the happier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum BetterDirection {
    #[strum(serialize = "higher is better")]
    HigherIsBetter,
    #[strum(serialize = "lower is better")]
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum MetricKind {
    /// The composite life evaluation.
    Score,
    /// Position within a year's cohort.
    Rank,
    /// A pre-decomposed additive factor of the score.
    Contribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub direction: BetterDirection,
    pub description: &'static str,
}

impl Metric {
    const fn new(
        name: &'static str,
        kind: MetricKind,
        direction: BetterDirection,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            direction,
            description,
        }
    }
}

const KNOWN_METRICS: [Metric; 9] = [
    Metric::new(
        COL::LADDER_SCORE,
        MetricKind::Score,
        BetterDirection::HigherIsBetter,
        "Life evaluation reported by respondents on a 0-10 ladder; influenced by the factors below",
    ),
    Metric::new(
        COL::RANK,
        MetricKind::Rank,
        BetterDirection::LowerIsBetter,
        "Position within the year's cohort, 1 being the happiest",
    ),
    Metric::new(
        COL::LOG_GDP_PER_CAPITA,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by GDP per capita",
    ),
    Metric::new(
        COL::SOCIAL_SUPPORT,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by having someone to count on",
    ),
    Metric::new(
        COL::HEALTHY_LIFE_EXPECTANCY,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by healthy life expectancy",
    ),
    Metric::new(
        COL::FREEDOM_TO_MAKE_LIFE_CHOICES,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by freedom to make life choices",
    ),
    Metric::new(
        COL::GENEROSITY,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by generosity",
    ),
    Metric::new(
        COL::PERCEPTIONS_OF_CORRUPTION,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Share of the score explained by the absence of perceived corruption",
    ),
    Metric::new(
        COL::DYSTOPIA_PLUS_RESIDUAL,
        MetricKind::Contribution,
        BetterDirection::HigherIsBetter,
        "Baseline of the least happy hypothetical country plus the unexplained residual",
    ),
];

/// Ordered set of selectable metrics. Identifier columns are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCatalog(Vec<Metric>);

impl MetricCatalog {
    /// Build the catalog from the columns a table actually carries, keeping the fixed order of
    /// the known metrics.
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let metrics = KNOWN_METRICS
            .iter()
            .filter(|metric| columns.iter().any(|c| c.as_ref() == metric.name))
            .cloned()
            .collect();
        Self(metrics)
    }

    pub fn get(&self, name: &str) -> HappinessResult<&Metric> {
        self.0
            .iter()
            .find(|metric| metric.name == name)
            .ok_or_else(|| HappinessError::UnknownMetric(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|metric| metric.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|metric| metric.name).collect()
    }

    /// Only the explanatory metrics.
    pub fn contributions(&self) -> impl Iterator<Item = &Metric> {
        self.0
            .iter()
            .filter(|metric| metric.kind == MetricKind::Contribution)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keeps_fixed_order_and_skips_identifiers() {
        let catalog = MetricCatalog::from_columns(&[
            COL::GENEROSITY,
            COL::COUNTRY,
            COL::YEAR,
            COL::LADDER_SCORE,
            COL::LOG_GDP_PER_CAPITA,
            "Unrelated",
        ]);
        assert_eq!(
            catalog.names(),
            vec![COL::LADDER_SCORE, COL::LOG_GDP_PER_CAPITA, COL::GENEROSITY]
        );
        assert!(!catalog.contains(COL::COUNTRY));
        assert!(!catalog.contains(COL::YEAR));
    }

    #[test]
    fn rank_is_lower_is_better() {
        let catalog = MetricCatalog::from_columns(&[COL::RANK, COL::LADDER_SCORE]);
        assert_eq!(
            catalog.get(COL::RANK).unwrap().direction,
            BetterDirection::LowerIsBetter
        );
        assert_eq!(
            catalog.get(COL::LADDER_SCORE).unwrap().direction,
            BetterDirection::HigherIsBetter
        );
        assert_eq!(catalog.contributions().count(), 0);
    }

    #[test]
    fn unknown_metric_is_an_error() {
        let catalog = MetricCatalog::from_columns(&[COL::LADDER_SCORE]);
        let err = catalog.get("Happiness index").unwrap_err();
        assert!(matches!(err, HappinessError::UnknownMetric(name) if name == "Happiness index"));
    }
}

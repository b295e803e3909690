//! This module stores the canonical column names of the happiness table, which every query and view
//! refers to. Source files may spell their headers after the upstream report's convention; those
//! are mapped onto the canonical names by `UPSTREAM_RENAMES` when a table is loaded.

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const RANK: &str = "Rank";
pub const LADDER_SCORE: &str = "Ladder Score";
pub const POSITION_CHANGES_YOY: &str = "Position Changes YOY";

pub const LOG_GDP_PER_CAPITA: &str = "Log GDP per capita";
pub const SOCIAL_SUPPORT: &str = "Social support";
pub const HEALTHY_LIFE_EXPECTANCY: &str = "Healthy life expectancy";
pub const FREEDOM_TO_MAKE_LIFE_CHOICES: &str = "Freedom to make life choices";
pub const GENEROSITY: &str = "Generosity";
pub const PERCEPTIONS_OF_CORRUPTION: &str = "Perceptions of corruption";
pub const DYSTOPIA_PLUS_RESIDUAL: &str = "Dystopia + residual";

/// Explanatory metrics in display order.
pub const CONTRIBUTIONS: [&str; 7] = [
    LOG_GDP_PER_CAPITA,
    SOCIAL_SUPPORT,
    HEALTHY_LIFE_EXPECTANCY,
    FREEDOM_TO_MAKE_LIFE_CHOICES,
    GENEROSITY,
    PERCEPTIONS_OF_CORRUPTION,
    DYSTOPIA_PLUS_RESIDUAL,
];

/// Upstream header -> canonical name. Headers not listed here pass through unchanged.
pub const UPSTREAM_RENAMES: [(&str, &str); 9] = [
    ("Country name", COUNTRY),
    ("Ladder score", LADDER_SCORE),
    ("Explained by: Log GDP per capita", LOG_GDP_PER_CAPITA),
    ("Explained by: Social support", SOCIAL_SUPPORT),
    ("Explained by: Healthy life expectancy", HEALTHY_LIFE_EXPECTANCY),
    (
        "Explained by: Freedom to make life choices",
        FREEDOM_TO_MAKE_LIFE_CHOICES,
    ),
    ("Explained by: Generosity", GENEROSITY),
    ("Explained by: Perceptions of corruption", PERCEPTIONS_OF_CORRUPTION),
    ("Dystopia + residual", DYSTOPIA_PLUS_RESIDUAL),
];

/// Look up the upstream spelling of a canonical column, if it has one.
pub fn upstream_name(canonical: &str) -> Option<&'static str> {
    UPSTREAM_RENAMES
        .iter()
        .find(|(_, to)| *to == canonical)
        .map(|(from, _)| *from)
}

/// Look up the canonical name of an upstream header, if it is a recognised one.
pub fn canonical_name(upstream: &str) -> Option<&'static str> {
    UPSTREAM_RENAMES
        .iter()
        .find(|(from, _)| *from == upstream)
        .map(|(_, to)| *to)
}

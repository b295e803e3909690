//! CSV fixtures shared by the unit tests.

use crate::{config::Config, loader::load_from_str, table::CanonicalTable};

/// Headers spelled the way the upstream report publishes them, plus the optional columns.
pub const UPSTREAM_CSV: &str = "\
Country name,Year,Rank,Ladder score,Explained by: Log GDP per capita,Explained by: Social support,Explained by: Healthy life expectancy,Explained by: Freedom to make life choices,Explained by: Generosity,Explained by: Perceptions of corruption,Dystopia + residual,Position Changes YOY,Upstream note
Finland,2021,1,7.8,1.3,0.9,0.8,0.7,0.2,0.4,2.3,0,a
Chad,2021,3,3.8,0.3,0.5,0.3,0.4,0.2,0.1,2.0,-1,b
India,2021,2,4.0,0.9,0.6,0.5,0.6,0.3,0.2,0.9,1,c
";

pub const WHOLE_AND_FRACTIONAL_YEARS_CSV: &str = "\
Country,Year,Ladder Score
Finland,2019,7.8
Finland,2020,7.9
Finland,2023.5,7.7
";

/// Japan and Norway across 2019-2023, rows deliberately out of year order.
pub const TREND_CSV: &str = "\
Country,Year,Ladder Score,Generosity,Healthy life expectancy
Japan,2021,6.0,0.10,0.95
Norway,2019,7.5,0.30,0.90
Japan,2019,5.9,0.12,0.94
Japan,2023,6.1,0.11,0.96
Norway,2020,7.4,,0.91
Japan,2020,6.2,0.13,0.93
Japan,2022,6.05,0.09,0.97
";

pub fn table_from(csv: &str) -> CanonicalTable {
    load_from_str(csv, &Config::default()).unwrap()
}

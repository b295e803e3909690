//! Reading a happiness CSV into a `CanonicalTable`: header renaming, type coercion, whole-year
//! normalisation and the derived catalogs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::{izip, Itertools};
use log::{debug, info, warn};
use polars::prelude::*;

use crate::{
    catalog::MetricCatalog,
    config::Config,
    error::{HappinessError, HappinessResult},
    table::{Capabilities, CanonicalTable, RankSource},
    COL,
};

/// Load and normalise the CSV file at `path`.
pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> HappinessResult<CanonicalTable> {
    let path = path.as_ref();
    info!("Attempting to load dataframe from {}", path.display());
    let df = read_csv(
        |options| {
            options
                .try_into_reader_with_file_path(Some(path.to_path_buf()))
                .and_then(|reader| reader.finish())
        },
        config,
    )
    .map_err(|e| HappinessError::Schema(format!("Failed to read '{}': {e}", path.display())))?;
    normalise(df, &path.display().to_string())
}

/// Load and normalise CSV text held in memory.
pub fn load_from_str(csv: &str, config: &Config) -> HappinessResult<CanonicalTable> {
    let df = read_csv(
        |options| {
            options
                .into_reader_with_file_handle(Cursor::new(csv.as_bytes()))
                .finish()
        },
        config,
    )
    .map_err(|e| HappinessError::Schema(format!("Failed to read CSV text: {e}")))?;
    normalise(df, "<memory>")
}

/// Read the header first, then the whole source with every known column forced to text.
/// Inference would otherwise fix a column's type from the first `infer_schema_length` rows and
/// fail on a later fractional year or non-numeric cell. `coerce_types` does the conversion.
fn read_csv<F>(read: F, config: &Config) -> PolarsResult<DataFrame>
where
    F: Fn(CsvReadOptions) -> PolarsResult<DataFrame>,
{
    let header = read(
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_n_rows(Some(1)),
    )?;
    let text_columns = known_columns_as_text(&header.get_column_names());
    debug!("Reading {} known column(s) as text", text_columns.len());
    read(
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(config.infer_schema_length))
            .with_schema_overwrite(Some(Arc::new(text_columns))),
    )
}

/// A `String` field for each header, in either spelling, that `coerce_types` converts.
fn known_columns_as_text(header: &[&str]) -> Schema {
    header
        .iter()
        .copied()
        .filter(|name| {
            let canonical = COL::canonical_name(name).unwrap_or(*name);
            [
                COL::COUNTRY,
                COL::YEAR,
                COL::RANK,
                COL::LADDER_SCORE,
                COL::POSITION_CHANGES_YOY,
            ]
            .contains(&canonical)
                || COL::CONTRIBUTIONS.contains(&canonical)
        })
        .map(|name| Field::new(name, DataType::String))
        .collect()
}

/// Turn a freshly parsed data frame into a `CanonicalTable`.
pub fn normalise(mut df: DataFrame, source: &str) -> HappinessResult<CanonicalTable> {
    debug!("Raw shape of '{source}': {:?}", df.shape());
    rename_upstream_headers(&mut df)?;

    let missing_identifiers = [COL::COUNTRY, COL::YEAR]
        .into_iter()
        .filter(|name| df.get_column_index(name).is_none())
        .collect_vec();
    if !missing_identifiers.is_empty() {
        return Err(HappinessError::Schema(format!(
            "'{source}' is missing identifier column(s): {}",
            missing_identifiers.join(", ")
        )));
    }
    if df.get_column_index(COL::LADDER_SCORE).is_none() {
        return Err(HappinessError::Schema(format!(
            "'{source}' has no '{}' column",
            COL::LADDER_SCORE
        )));
    }

    coerce_types(&mut df)?;
    let mut df = keep_whole_years(df)?;
    if df.height() == 0 {
        return Err(HappinessError::EmptyDataset(format!(
            "no rows of '{source}' carry a country and a whole year"
        )));
    }
    reject_duplicates(&df)?;

    let rank = if df.get_column_index(COL::RANK).is_some() {
        RankSource::Provided
    } else {
        info!("No '{}' column in '{source}', ranking by ladder score", COL::RANK);
        df.with_column(derive_rank(&df)?)?;
        RankSource::Derived
    };
    let capabilities = Capabilities {
        rank,
        position_changes: df.get_column_index(COL::POSITION_CHANGES_YOY).is_some(),
    };

    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let catalog = MetricCatalog::from_columns(&column_names);
    let missing_contributions = COL::CONTRIBUTIONS
        .iter()
        .filter(|name| !catalog.contains(name))
        .collect_vec();
    if !missing_contributions.is_empty() {
        warn!("'{source}' has no column for: {missing_contributions:?}");
    }

    let countries: Vec<String> = df
        .column(COL::COUNTRY)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let years: Vec<i32> = df
        .column(COL::YEAR)?
        .i32()?
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!(
        "Loaded '{source}' with shape {:?}: {} countries, years {years:?}",
        df.shape(),
        countries.len()
    );
    Ok(CanonicalTable {
        df,
        countries,
        years,
        catalog: Arc::new(catalog),
        capabilities,
    })
}

fn rename_upstream_headers(df: &mut DataFrame) -> HappinessResult<()> {
    for (upstream, canonical) in COL::UPSTREAM_RENAMES {
        if upstream == canonical || df.get_column_index(upstream).is_none() {
            continue;
        }
        if df.get_column_index(canonical).is_some() {
            return Err(HappinessError::Schema(format!(
                "both '{upstream}' and '{canonical}' are present"
            )));
        }
        debug!("Renaming '{upstream}' to '{canonical}'");
        df.rename(upstream, canonical)?;
    }
    Ok(())
}

/// Countries become strings, scores and contributions floats, ranks and position changes integers.
/// Cells that do not parse become missing values.
fn coerce_types(df: &mut DataFrame) -> HappinessResult<()> {
    let country = df.column(COL::COUNTRY)?.cast(&DataType::String)?;
    df.with_column(country)?;

    let float_columns = std::iter::once(COL::LADDER_SCORE).chain(COL::CONTRIBUTIONS);
    for name in float_columns {
        if df.get_column_index(name).is_some() {
            let values = df.column(name)?.cast(&DataType::Float64)?;
            df.with_column(values)?;
        }
    }
    for name in [COL::RANK, COL::POSITION_CHANGES_YOY] {
        if df.get_column_index(name).is_some() {
            let values = df
                .column(name)?
                .cast(&DataType::Float64)?
                .cast(&DataType::Int32)?;
            df.with_column(values)?;
        }
    }
    Ok(())
}

/// Drop rows without a country or without a whole-number year, then store years as `Int32`.
/// Fractional years mark interim revisions and are excluded, never rounded. Years outside the
/// `Int32` range are excluded too.
fn keep_whole_years(df: DataFrame) -> HappinessResult<DataFrame> {
    let years = df.column(COL::YEAR)?.cast(&DataType::Float64)?;
    let representable = i32::MIN as f64..=i32::MAX as f64;
    let mut fractional: BTreeSet<String> = BTreeSet::new();
    let mut out_of_range: BTreeSet<String> = BTreeSet::new();
    let keep: BooleanChunked = izip!(df.column(COL::COUNTRY)?.str()?, years.f64()?)
        .map(|(country, year)| match (country, year) {
            (Some(_), Some(year)) if year.fract() == 0.0 && representable.contains(&year) => true,
            (_, Some(year)) if year.is_finite() && year.fract() != 0.0 => {
                fractional.insert(year.to_string());
                false
            }
            (Some(_), Some(year)) if year.is_finite() => {
                out_of_range.insert(year.to_string());
                false
            }
            _ => false,
        })
        .collect();
    if !fractional.is_empty() {
        warn!("Excluding rows with fractional years: {fractional:?}");
    }
    if !out_of_range.is_empty() {
        warn!("Excluding rows with out of range years: {out_of_range:?}");
    }

    let mut df = df.filter(&keep)?;
    let years = df.column(COL::YEAR)?.cast(&DataType::Float64)?.cast(&DataType::Int32)?;
    df.with_column(years)?;
    debug!("Kept {} rows with whole years", df.height());
    Ok(df)
}

fn reject_duplicates(df: &DataFrame) -> HappinessResult<()> {
    let mut seen: HashSet<(&str, i32)> = HashSet::new();
    for (country, year) in izip!(df.column(COL::COUNTRY)?.str()?, df.column(COL::YEAR)?.i32()?) {
        if let (Some(country), Some(year)) = (country, year) {
            if !seen.insert((country, year)) {
                return Err(HappinessError::Schema(format!(
                    "duplicate record for ({country}, {year})"
                )));
            }
        }
    }
    Ok(())
}

/// Ordinal rank within each year by descending ladder score. Ties keep input order; rows without a
/// score get no rank.
fn derive_rank(df: &DataFrame) -> HappinessResult<Series> {
    let mut cohorts: BTreeMap<i32, Vec<(usize, f64)>> = BTreeMap::new();
    for (idx, (year, score)) in izip!(
        df.column(COL::YEAR)?.i32()?,
        df.column(COL::LADDER_SCORE)?.f64()?
    )
    .enumerate()
    {
        if let (Some(year), Some(score)) = (year, score) {
            cohorts.entry(year).or_default().push((idx, score));
        }
    }
    let mut ranks: Vec<Option<i32>> = vec![None; df.height()];
    for cohort in cohorts.values_mut() {
        cohort.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (position, (idx, _)) in cohort.iter().enumerate() {
            ranks[*idx] = Some(position as i32 + 1);
        }
    }
    Ok(Series::new(COL::RANK, ranks))
}

/// Memoises loaded tables by path so that a process reads each source once.
#[derive(Debug, Default)]
pub struct TableCache {
    config: Config,
    tables: HashMap<PathBuf, Arc<CanonicalTable>>,
}

impl TableCache {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tables: HashMap::new(),
        }
    }

    /// Return the cached table for `path`, loading it on first use.
    pub fn get_or_load<P: AsRef<Path>>(&mut self, path: P) -> HappinessResult<Arc<CanonicalTable>> {
        let path = path.as_ref().to_path_buf();
        if let Some(table) = self.tables.get(&path) {
            debug!("Using cached table for {}", path.display());
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load(&path, &self.config)?);
        self.tables.insert(path, Arc::clone(&table));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::test_utils::{UPSTREAM_CSV, WHOLE_AND_FRACTIONAL_YEARS_CSV};

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn floats(table: &CanonicalTable, name: &str) -> Vec<Option<f64>> {
        table
            .as_df()
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn ints(table: &CanonicalTable, name: &str) -> Vec<Option<i32>> {
        table
            .as_df()
            .column(name)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn upstream_headers_should_be_renamed() {
        let table = load_from_str(UPSTREAM_CSV, &Config::default()).unwrap();
        for name in [
            COL::COUNTRY,
            COL::LADDER_SCORE,
            COL::LOG_GDP_PER_CAPITA,
            COL::GENEROSITY,
            COL::DYSTOPIA_PLUS_RESIDUAL,
        ] {
            assert!(
                table.as_df().get_column_index(name).is_some(),
                "{name} should be present"
            );
        }
        assert!(table.as_df().get_column_index("Country name").is_none());
        assert!(table.as_df().get_column_index("Upstream note").is_some());
    }

    #[test]
    fn fractional_years_are_dropped_not_rounded() {
        let table = load_from_str(WHOLE_AND_FRACTIONAL_YEARS_CSV, &Config::default()).unwrap();
        assert_eq!(table.years(), &[2019, 2020]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn only_fractional_years_is_an_empty_dataset() {
        let csv = "Country,Year,Ladder Score\nFinland,2020.5,7.8\nChad,2021.25,3.8\n";
        let err = load_from_str(csv, &Config::default()).unwrap_err();
        assert!(matches!(err, HappinessError::EmptyDataset(_)));
    }

    #[test]
    fn years_outside_i32_are_dropped() {
        let csv = "\
Country,Year,Ladder Score
Finland,2021,7.8
Chad,3000000000,3.8
India,-3000000000,4.0
";
        let table = load_from_str(csv, &Config::default()).unwrap();
        assert_eq!(table.years(), &[2021]);
        assert_eq!(table.countries(), &["Finland".to_string()]);
        assert_eq!(ints(&table, COL::YEAR), vec![Some(2021)]);
    }

    #[test]
    fn non_numeric_cells_become_missing() {
        let csv = "\
Country,Year,Rank,Ladder Score,Generosity,Position Changes YOY
Finland,2021,1,7.8,n/a,0
Chad,2021,unranked,not reported,0.2,-1
";
        let table = load_from_str(csv, &Config::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(floats(&table, COL::LADDER_SCORE), vec![Some(7.8), None]);
        assert_eq!(floats(&table, COL::GENEROSITY), vec![None, Some(0.2)]);
        assert_eq!(ints(&table, COL::RANK), vec![Some(1), None]);
        assert_eq!(ints(&table, COL::POSITION_CHANGES_YOY), vec![Some(0), Some(-1)]);
    }

    #[test]
    fn rows_past_the_inference_window_are_normalised() {
        let config = Config::default();
        let mut csv = String::from("Country,Year,Ladder Score,Generosity\n");
        for i in 0..=config.infer_schema_length {
            csv.push_str(&format!("Country {i},2021,5.0,0.1\n"));
        }
        csv.push_str("Interim revision,2023.5,4.0,0.2\n");
        csv.push_str("Unscored,2022,n/a,not reported\n");

        let table = load_from_str(&csv, &config).unwrap();
        assert_eq!(table.years(), &[2021, 2022]);
        assert_eq!(table.len(), config.infer_schema_length + 2);
        assert!(!table.countries().contains(&"Interim revision".to_string()));
        let ladder = floats(&table, COL::LADDER_SCORE);
        assert_eq!(ladder.first(), Some(&Some(5.0)));
        assert_eq!(ladder.last(), Some(&None));
        assert_eq!(floats(&table, COL::GENEROSITY).last(), Some(&None));

        let file = write_csv(&csv);
        assert_eq!(load(file.path(), &config).unwrap(), table);
    }

    #[test]
    fn missing_identifiers_is_a_schema_error() {
        let csv = "Nation,Ladder Score\nFinland,7.8\n";
        let err = load_from_str(csv, &Config::default()).unwrap_err();
        match err {
            HappinessError::Schema(msg) => {
                assert!(msg.contains(COL::COUNTRY));
                assert!(msg.contains(COL::YEAR));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_source_is_a_schema_error() {
        let err = load("/definitely/not/here.csv", &Config::default()).unwrap_err();
        assert!(matches!(err, HappinessError::Schema(_)));
    }

    #[test]
    fn duplicate_pairs_are_rejected() {
        let csv = "Country,Year,Ladder Score\nFinland,2021,7.8\nFinland,2021,7.7\n";
        let err = load_from_str(csv, &Config::default()).unwrap_err();
        assert!(matches!(err, HappinessError::Schema(msg) if msg.contains("Finland")));
    }

    #[test]
    fn catalogs_are_sorted_and_distinct() {
        let csv = "\
Country,Year,Ladder Score
Norway,2021,7.3
Chad,2020,3.9
Norway,2020,7.4
Chad,2021,3.8
";
        let table = load_from_str(csv, &Config::default()).unwrap();
        assert_eq!(table.countries(), &["Chad".to_string(), "Norway".to_string()]);
        assert_eq!(table.years(), &[2020, 2021]);
        assert_eq!(table.metrics(), vec![COL::LADDER_SCORE, COL::RANK]);
    }

    #[test]
    fn rank_is_derived_per_year_when_absent() {
        let csv = "\
Country,Year,Ladder Score
Chad,2021,3.8
Finland,2021,7.8
India,2021,4.0
Chad,2022,4.1
";
        let table = load_from_str(csv, &Config::default()).unwrap();
        assert_eq!(table.capabilities().rank, RankSource::Derived);
        let ranks: Vec<Option<i32>> = table
            .as_df()
            .column(COL::RANK)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ranks, vec![Some(3), Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn provided_rank_is_kept() {
        let table = load_from_str(UPSTREAM_CSV, &Config::default()).unwrap();
        assert_eq!(table.capabilities().rank, RankSource::Provided);
        assert!(table.capabilities().position_changes);
    }

    #[test]
    fn loading_twice_is_idempotent() {
        let file = write_csv(UPSTREAM_CSV);
        let first = load(file.path(), &Config::default()).unwrap();
        let second = load(file.path(), &Config::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cache_should_not_reload() {
        let file = write_csv(UPSTREAM_CSV);
        let mut cache = TableCache::new(Config::default());
        let first = cache.get_or_load(file.path()).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use happiness::{
    config::Config,
    formatters::{CSVFormatter, JSONFormatter, OutputFormatter, OutputGenerator},
    query::{CaseSensitivity, CountrySelection, MatchType, YearRange},
    sample::{generate, HeaderStyle, SampleSpec},
    table::{CanonicalTable, RankSource},
    view_request::{View, ViewRequest},
    WorldHappiness, COL,
};
use itertools::izip;
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use crate::display::{display_countries, display_metrics, display_view, display_years};
use crate::error::HappinessCliResult;

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn write_output<T, U>(
    output_generator: T,
    mut data: DataFrame,
    output_file: Option<U>,
) -> HappinessCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    if let Some(output_file) = output_file {
        let mut f = File::create(output_file).context("Failed to write output")?;
        output_generator.save(&mut f, &mut data)?;
    } else {
        let mut stdout_lock = std::io::stdout().lock();
        output_generator.save(&mut stdout_lock, &mut data)?;
    };
    Ok(())
}

/// Position changes of every country in `year`, keyed by country.
fn position_changes(table: &CanonicalTable, year: i32) -> HappinessCliResult<HashMap<String, i32>> {
    let df = table.slice_by_year(year)?.into_df();
    let changes = df
        .column(COL::POSITION_CHANGES_YOY)?
        .cast(&DataType::Int32)?;
    Ok(izip!(df.column(COL::COUNTRY)?.str()?, changes.i32()?)
        .filter_map(|(country, change)| Some((country?.to_string(), change?)))
        .collect())
}

/// Print or write a view according to the requested output options.
fn emit_view(
    happiness: &WorldHappiness,
    view: &View,
    output: &OutputArgs,
) -> HappinessCliResult<()> {
    match output.output_format {
        OutputFormat::Table => {
            let capabilities = happiness.table.capabilities();
            let changes = match view {
                View::TopBottom { year, .. } if capabilities.position_changes => {
                    Some(position_changes(&happiness.table, *year)?)
                }
                _ => None,
            };
            display_view(view, changes.as_ref());
            if let View::TopBottom { metric, .. } = view {
                if metric == COL::RANK && capabilities.rank == RankSource::Derived {
                    println!("\nRanks were derived from '{}' within each year.", COL::LADDER_SCORE);
                }
            }
        }
        OutputFormat::Csv => {
            write_output(CSVFormatter, view.to_df()?, output.output_file.as_deref())?;
        }
        OutputFormat::Json => {
            if let Some(output_file) = &output.output_file {
                let f = File::create(output_file).context("Failed to write output")?;
                serde_json::to_writer_pretty(f, view)?;
            } else {
                println!("{}", serde_json::to_string_pretty(view)?);
            }
        }
    }
    Ok(())
}

fn run_view(config: Config, request: ViewRequest, output: &OutputArgs) -> HappinessCliResult<()> {
    debug!("request: {request:?}");
    let happiness = WorldHappiness::new_with_config(config)?;
    let view = happiness.view(&request)?;
    emit_view(&happiness, &view, output)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()>;
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(
        short = 'f',
        long,
        value_name = "table|csv|json",
        default_value = "table",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(
        short = 'o',
        long,
        help = "Output file to place the results (csv and json only)"
    )]
    output_file: Option<String>,
}

#[derive(Debug, Clone, clap::ValueEnum, Copy)]
enum MatchTypeArgs {
    Regex,
    Exact,
    Contains,
    Startswith,
}

impl From<MatchTypeArgs> for MatchType {
    fn from(value: MatchTypeArgs) -> Self {
        match value {
            MatchTypeArgs::Exact => MatchType::Exact,
            MatchTypeArgs::Regex => MatchType::Regex,
            MatchTypeArgs::Contains => MatchType::Contains,
            MatchTypeArgs::Startswith => MatchType::Startswith,
        }
    }
}

#[derive(Debug, Clone, clap::ValueEnum, Copy)]
enum CaseSensitivityArgs {
    Sensitive,
    Insensitive,
}

impl From<CaseSensitivityArgs> for CaseSensitivity {
    fn from(value: CaseSensitivityArgs) -> Self {
        match value {
            CaseSensitivityArgs::Insensitive => CaseSensitivity::Insensitive,
            CaseSensitivityArgs::Sensitive => CaseSensitivity::Sensitive,
        }
    }
}

/// The Countries command lists the countries present in the data, optionally filtered by name.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[arg(short, long, help = "Only list countries whose name matches this text")]
    search: Option<String>,
    #[arg(
        value_enum,
        short = 'm',
        long,
        value_name = "MATCH_TYPE",
        help = "Type of matching to perform with '--search'",
        default_value_t=MatchTypeArgs::Contains
    )]
    match_type: MatchTypeArgs,
    #[arg(
        value_enum,
        long,
        value_name = "CASE_SENSITIVITY",
        help = "Type of case sensitivity used with '--search'",
        default_value_t=CaseSensitivityArgs::Insensitive
    )]
    case_sensitivity: CaseSensitivityArgs,
}

impl RunCommand for CountriesCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `countries` subcommand");
        let happiness = WorldHappiness::new_with_config(config)?;
        let countries = match &self.search {
            Some(text) => happiness.table.search_countries(
                text,
                self.match_type.into(),
                self.case_sensitivity.into(),
            )?,
            None => happiness
                .table
                .countries()
                .iter()
                .map(String::as_str)
                .collect(),
        };
        println!("\nThe following countries are available:");
        display_countries(&countries);
        Ok(())
    }
}

/// The Years command lists the report years present in the data.
#[derive(Args, Debug)]
pub struct YearsCommand;

impl RunCommand for YearsCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `years` subcommand");
        let happiness = WorldHappiness::new_with_config(config)?;
        display_years(happiness.table.years());
        Ok(())
    }
}

/// The Metrics command describes every metric in the data and how it is measured.
#[derive(Args, Debug)]
pub struct MetricsCommand;

impl RunCommand for MetricsCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `metrics` subcommand");
        let happiness = WorldHappiness::new_with_config(config)?;
        display_metrics(happiness.table.catalog());
        if happiness.table.capabilities().rank == RankSource::Derived {
            println!(
                "\n'{}' is not in the source and was derived from '{}'.",
                COL::RANK,
                COL::LADDER_SCORE
            );
        }
        Ok(())
    }
}

/// The Map command outputs one value of a metric per country for a year.
#[derive(Args, Debug)]
pub struct MapCommand {
    #[arg(short, long, help = "Report year")]
    year: i32,
    #[arg(short, long, default_value = COL::LADDER_SCORE, help = "Metric to map")]
    metric: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for MapCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `map` subcommand");
        let request = ViewRequest::Map {
            year: self.year,
            metric: self.metric.clone(),
        };
        run_view(config, request, &self.output)
    }
}

/// The Trend command outputs a metric over the years for a set of countries.
#[derive(Args, Debug)]
pub struct TrendCommand {
    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Comma-separated countries to include; 'All' or nothing includes every country"
    )]
    countries: Vec<String>,
    #[arg(short, long, default_value = COL::LADDER_SCORE, help = "Metric to follow")]
    metric: String,
    // Note: using `std::vec::Vec` rather than just `Vec`, to enforce that multiple year ranges are
    // passed in a single argument e.g. `-y 2019...2020,2023`. See
    // https://docs.rs/clap/latest/clap/_derive/index.html#arg-types
    #[arg(
        short,
        long,
        help = "\
            Filter by year ranges. All ranges are inclusive; multiple ranges can be\n\
            comma-separated.",
        value_name = "YEAR|START...|...END|START...END",
        value_parser = parse_year_range,
    )]
    year_range: Option<std::vec::Vec<YearRange>>,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for TrendCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `trend` subcommand");
        let request = ViewRequest::Trend {
            countries: CountrySelection::from_names(self.countries.iter().cloned()),
            metric: self.metric.clone(),
            years: self
                .year_range
                .iter()
                .flatten()
                .map(YearRange::to_string)
                .collect(),
        };
        run_view(config, request, &self.output)
    }
}

/// The Correlation command pairs two metrics per country for a year.
#[derive(Args, Debug)]
pub struct CorrelationCommand {
    #[arg(short, long, help = "Report year")]
    year: i32,
    #[arg(short = 'x', long, default_value = COL::LOG_GDP_PER_CAPITA, help = "Metric on the x axis")]
    metric_x: String,
    #[arg(short = 'Y', long, default_value = COL::LADDER_SCORE, help = "Metric on the y axis")]
    metric_y: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for CorrelationCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `correlation` subcommand");
        let request = ViewRequest::Correlation {
            year: self.year,
            metric_x: self.metric_x.clone(),
            metric_y: self.metric_y.clone(),
        };
        run_view(config, request, &self.output)
    }
}

/// The Top command lists the best and worst countries of a year.
#[derive(Args, Debug)]
pub struct TopCommand {
    #[arg(short, long, help = "Report year")]
    year: i32,
    #[arg(short, long, help = "Metric to rank by [default: Rank]")]
    metric: Option<String>,
    #[arg(
        short = 'n',
        long = "count",
        help = "Number of countries at each end [default: config `top_n`]"
    )]
    n: Option<usize>,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for TopCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `top` subcommand");
        let request = ViewRequest::TopBottom {
            year: self.year,
            metric: self.metric.clone(),
            n: self.n,
        };
        run_view(config, request, &self.output)
    }
}

/// The Average command places each country of a year against the global average.
#[derive(Args, Debug)]
pub struct AverageCommand {
    #[arg(short, long, help = "Report year")]
    year: i32,
    #[arg(short, long, default_value = COL::LADDER_SCORE, help = "Metric to average")]
    metric: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for AverageCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `average` subcommand");
        let request = ViewRequest::GlobalAverage {
            year: self.year,
            metric: self.metric.clone(),
        };
        run_view(config, request, &self.output)
    }
}

/// The Recipe command loads a view request from a JSON file and outputs the view
#[derive(Args, Debug)]
pub struct RecipeCommand {
    #[arg(index = 1)]
    recipe_file: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl RunCommand for RecipeCommand {
    fn run(&self, config: Config) -> HappinessCliResult<()> {
        info!("Running `recipe` subcommand");
        let recipe = std::fs::read_to_string(&self.recipe_file).context(format!(
            "Failed to read recipe from file: {}",
            self.recipe_file
        ))?;
        let request: ViewRequest = serde_json::from_str(&recipe)?;
        run_view(config, request, &self.output)
    }
}

/// The Sample command writes a synthetic dataset that the other commands can load.
#[derive(Args, Debug)]
pub struct SampleCommand {
    #[arg(long, default_value_t = 42, help = "Seed of the random draws")]
    seed: u64,
    #[arg(
        long,
        help = "Spell headers as the published report does ('Country name', 'Explained by: ...')"
    )]
    upstream_headers: bool,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        default_value = "csv",
        help = "Output format for the sample"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the sample")]
    output_file: Option<PathBuf>,
}

impl RunCommand for SampleCommand {
    fn run(&self, _config: Config) -> HappinessCliResult<()> {
        info!("Running `sample` subcommand");
        let spec = SampleSpec {
            seed: self.seed,
            header_style: if self.upstream_headers {
                HeaderStyle::Upstream
            } else {
                HeaderStyle::Canonical
            },
            ..SampleSpec::default()
        };
        let data = generate(&spec)?;
        let formatter = match self.output_format {
            OutputFormat::Json => OutputFormatter::Json(JSONFormatter),
            OutputFormat::Csv | OutputFormat::Table => OutputFormatter::Csv(CSVFormatter),
        };
        write_output(formatter, data, self.output_file.as_deref())
    }
}

/// Year ranges can be comma-separated
fn parse_year_range(value: &str) -> anyhow::Result<Vec<YearRange>> {
    value
        .split(',')
        .map(|range| range.parse::<YearRange>().map_err(anyhow::Error::from))
        .collect()
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Explore the World Happiness Report from the terminal", long_about = None, name="happiness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'd',
        long = "data",
        help = "CSV file to load instead of the configured `data_path`",
        global = true
    )]
    pub data: Option<PathBuf>,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// List countries in the data
    Countries(CountriesCommand),
    /// List report years in the data
    Years(YearsCommand),
    /// Describe the available metrics
    Metrics(MetricsCommand),
    /// One value of a metric per country for a year
    Map(MapCommand),
    /// A metric over time for a set of countries
    Trend(TrendCommand),
    /// Two metrics against each other for a year
    Correlation(CorrelationCommand),
    /// Best and worst countries of a year
    Top(TopCommand),
    /// Countries of a year against the global average
    Average(AverageCommand),
    /// From recipe
    Recipe(RecipeCommand),
    /// Write a synthetic dataset
    Sample(SampleCommand),
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::str::FromStr;

    use tempfile::NamedTempFile;

    use super::*;

    fn sample_config() -> (NamedTempFile, Config) {
        let data_file = NamedTempFile::new().unwrap();
        SampleCommand {
            seed: 1,
            upstream_headers: true,
            output_format: OutputFormat::Csv,
            output_file: Some(data_file.path().to_path_buf()),
        }
        .run(Config::default())
        .unwrap();
        let config = Config {
            data_path: data_file.path().to_path_buf(),
            ..Config::default()
        };
        (data_file, config)
    }

    #[test]
    fn test_recipe_command() {
        let (_data_file, config) = sample_config();
        let mut recipe_file = NamedTempFile::new().unwrap();
        write!(
            recipe_file,
            r#"{{"view": "topBottom", "year": 2021, "metric": "Ladder Score", "n": 3}}"#
        )
        .unwrap();
        let output_file = NamedTempFile::new().unwrap();
        let recipe_command = RecipeCommand {
            recipe_file: recipe_file.path().to_string_lossy().to_string(),
            output: OutputArgs {
                output_format: OutputFormat::Csv,
                output_file: Some(output_file.path().to_string_lossy().to_string()),
            },
        };
        recipe_command.run(config).unwrap();

        let written = std::fs::read_to_string(output_file.path()).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("Group,Country,Year,Ladder Score"));
        assert_eq!(lines.count(), 6);
    }

    #[test]
    fn test_view_commands_run_on_sample() {
        let (_data_file, config) = sample_config();
        let json_output = NamedTempFile::new().unwrap();
        AverageCommand {
            year: 2020,
            metric: COL::GENEROSITY.into(),
            output: OutputArgs {
                output_format: OutputFormat::Json,
                output_file: Some(json_output.path().to_string_lossy().to_string()),
            },
        }
        .run(config.clone())
        .unwrap();
        let view: serde_json::Value =
            serde_json::from_reader(File::open(json_output.path()).unwrap()).unwrap();
        assert_eq!(view["view"], "globalAverage");
        assert_eq!(view["rows"].as_array().unwrap().len(), 6);

        let unknown_metric = MapCommand {
            year: 2020,
            metric: "Wealth".into(),
            output: OutputArgs {
                output_format: OutputFormat::Table,
                output_file: None,
            },
        }
        .run(config);
        assert!(unknown_metric.is_err());
    }

    #[test]
    fn test_parse_year_range() {
        assert_eq!(
            parse_year_range("2019").unwrap(),
            vec![YearRange::Between(2019, 2019)]
        );
        assert_eq!(
            parse_year_range("2019...2020,2023...").unwrap(),
            vec![YearRange::Between(2019, 2020), YearRange::After(2023)]
        );
        assert_eq!(
            parse_year_range("...2020,2022").unwrap(),
            vec![YearRange::Before(2020), YearRange::Between(2022, 2022)]
        );
        assert!(parse_year_range("2020,soon").is_err());
    }

    #[test]
    fn output_type_should_deserialize_properly() {
        let output_format = OutputFormat::from_str("csv");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Csv,
            "csv format should be parsed correctly"
        );
        let output_format = OutputFormat::from_str("JSON");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Json,
            "parsing should be case insensitive"
        );
        let output_format = OutputFormat::from_str("geojson");
        assert!(output_format.is_err(), "non listed formats should fail");
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

use std::sync::Arc;

use log::debug;

use crate::{
    config::Config,
    error::HappinessResult,
    table::CanonicalTable,
    view_request::{View, ViewRequest},
};

// Re-exports
pub use column_names as COL;

// Modules
pub mod catalog;
pub mod column_names;
pub mod config;
pub mod error;
#[cfg(feature = "formatters")]
pub mod formatters;
pub mod loader;
pub mod query;
pub mod sample;
pub mod table;
#[cfg(test)]
mod test_utils;
pub mod view_request;

/// Type for the loaded happiness table and the configuration it was loaded with
pub struct WorldHappiness {
    pub table: Arc<CanonicalTable>,
    pub config: Config,
}

impl WorldHappiness {
    /// Setup the WorldHappiness object with default configuration
    pub fn new() -> HappinessResult<Self> {
        Self::new_with_config(Config::default())
    }

    /// Setup the WorldHappiness object with custom configuration, loading `config.data_path`
    pub fn new_with_config(config: Config) -> HappinessResult<Self> {
        debug!("config: {config:?}");
        let table = loader::load(&config.data_path, &config)?;
        Ok(Self {
            table: Arc::new(table),
            config,
        })
    }

    /// Wrap an already loaded table
    pub fn from_table(table: Arc<CanonicalTable>, config: Config) -> Self {
        Self { table, config }
    }

    /// Evaluates a `ViewRequest` against the loaded table
    pub fn view(&self, request: &ViewRequest) -> HappinessResult<View> {
        request.evaluate(&self.table, self.config.top_n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::test_utils::UPSTREAM_CSV;

    #[test]
    fn new_with_config_loads_data_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(UPSTREAM_CSV.as_bytes()).unwrap();
        let config = Config {
            data_path: file.path().to_path_buf(),
            top_n: 2,
            ..Config::default()
        };
        let happiness = WorldHappiness::new_with_config(config).unwrap();
        assert_eq!(happiness.table.countries(), ["Chad", "Finland", "India"]);

        let view = happiness
            .view(&ViewRequest::TopBottom {
                year: 2021,
                metric: Some(COL::LADDER_SCORE.into()),
                n: None,
            })
            .unwrap();
        match view {
            View::TopBottom { top, bottom, .. } => {
                assert_eq!(top.len(), 2);
                assert_eq!(bottom.len(), 2);
                assert_eq!(top[0].country, "Finland");
                assert_eq!(bottom[0].country, "Chad");
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn from_table_shares_a_cached_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(UPSTREAM_CSV.as_bytes()).unwrap();
        let mut cache = loader::TableCache::new(Config::default());
        let table = cache.get_or_load(file.path()).unwrap();
        let happiness = WorldHappiness::from_table(Arc::clone(&table), Config::default());
        assert!(Arc::ptr_eq(&happiness.table, &table));

        let view = happiness
            .view(&ViewRequest::Map {
                year: 2021,
                metric: COL::GENEROSITY.into(),
            })
            .unwrap();
        assert!(matches!(view, View::Map { ref values, .. } if values.len() == 3));
    }

    #[test]
    fn missing_data_file_is_an_error() {
        let config = Config {
            data_path: "does/not/exist.csv".into(),
            ..Config::default()
        };
        assert!(WorldHappiness::new_with_config(config).is_err());
    }
}

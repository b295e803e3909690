use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// CSV file holding one row per country-year.
    pub data_path: PathBuf,
    /// Number of rows polars looks at when inferring column types.
    pub infer_schema_length: usize,
    /// Default N for the top/bottom view.
    pub top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from("data/world_happiness.csv"),
            infer_schema_length: 1000,
            top_n: 5,
        }
    }
}

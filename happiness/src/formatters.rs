use std::io::{Cursor, Write};

use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HappinessError, HappinessResult};

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`
/// Doesn't cover all types but the ones a happiness table holds.
fn any_value_to_json(value: &AnyValue) -> HappinessResult<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::StringOwned(s) => Ok(Value::String(s.to_string())),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        other => Err(HappinessError::Schema(format!(
            "Cannot convert {other:?} to JSON"
        ))),
    }
}

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to a writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> HappinessResult<()>;
    fn format(&self, df: &mut DataFrame) -> HappinessResult<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;

        String::from_utf8(data).map_err(|e| HappinessError::Schema(e.to_string()))
    }
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    Csv(CSVFormatter),
    Json(JSONFormatter),
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CSVFormatter;

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> HappinessResult<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
}

/// Format the results as a JSON array with one object per record
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct JSONFormatter;

impl OutputGenerator for JSONFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> HappinessResult<()> {
        let mut rows: Vec<Value> = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let mut row = serde_json::Map::new();
            for column in df.get_columns() {
                row.insert(column.name().to_string(), any_value_to_json(&column.get(idx)?)?);
            }
            rows.push(Value::Object(row));
        }
        serde_json::to_writer(&mut *writer, &rows)?;
        writeln!(writer)?;
        Ok(())
    }
}

use crate::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDateTime};
use log::{Log, Metadata, Record as LogRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rows generated when no explicit count is given
pub const DEFAULT_ROW_COUNT: usize = 1000;
/// Seed used when no explicit seed is given
pub const DEFAULT_SEED: u64 = 42;
/// A row is flagged hot when its temperature is strictly above this (°C)
pub const HOT_THRESHOLD_C: f64 = 25.0;
/// Default cut-off for the hot-day listing (°C)
pub const HOT_DAY_FILTER_C: f64 = 30.0;
/// Timestamp layout used in the flat table files
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Header of the recomputed Fahrenheit column in the cleaned table
pub const TEMPERATURE_FAHRENHEIT_HEADER: &str = "Temperature_Fahrenheit";

/// Simple logger implementation
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        println!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Named columns of the weather table, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Date,
    Temperature,
    Precipitation,
    Humidity,
    Latitude,
    Longitude,
    #[serde(rename = "Temperature_F")]
    TemperatureF,
    #[serde(rename = "Is_Hot")]
    IsHot,
}

impl Column {
    /// Every column of the table, in header order.
    pub const ALL: [Column; 8] = [
        Column::Date,
        Column::Temperature,
        Column::Precipitation,
        Column::Humidity,
        Column::Latitude,
        Column::Longitude,
        Column::TemperatureF,
        Column::IsHot,
    ];

    /// Columns that carry a numeric value (`Is_Hot` counts as 0/1).
    pub const NUMERIC: [Column; 7] = [
        Column::Temperature,
        Column::Precipitation,
        Column::Humidity,
        Column::Latitude,
        Column::Longitude,
        Column::TemperatureF,
        Column::IsHot,
    ];

    /// Exact header name used in the flat files
    pub fn name(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Temperature => "Temperature",
            Column::Precipitation => "Precipitation",
            Column::Humidity => "Humidity",
            Column::Latitude => "Latitude",
            Column::Longitude => "Longitude",
            Column::TemperatureF => "Temperature_F",
            Column::IsHot => "Is_Hot",
        }
    }

    pub fn is_numeric(self) -> bool {
        self != Column::Date
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| PipelineError::InvalidArgument(format!("Unknown column: {}", s)))
    }
}

/// One row of the weather table.
///
/// Measured values are optional because a table loaded from disk may contain
/// empty cells. Generated tables always have every value present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub timestamp: NaiveDateTime,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub humidity: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature_f: Option<f64>,
    pub is_hot: bool,
}

impl WeatherRecord {
    /// Calendar month (1-12) of the timestamp
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    /// Value of a numeric column for this row. `Date` has no numeric value.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Date => None,
            Column::Temperature => self.temperature,
            Column::Precipitation => self.precipitation,
            Column::Humidity => self.humidity,
            Column::Latitude => self.latitude,
            Column::Longitude => self.longitude,
            Column::TemperatureF => self.temperature_f,
            Column::IsHot => Some(if self.is_hot { 1.0 } else { 0.0 }),
        }
    }
}

/// Read-only weather table. Row order is whatever the producer established;
/// the generator guarantees ascending timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherTable {
    records: Vec<WeatherRecord>,
}

impl WeatherTable {
    pub fn new(records: Vec<WeatherRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Present values of a numeric column, missing cells skipped
    pub fn values(&self, column: Column) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.numeric(column))
            .collect()
    }

    pub fn into_records(self) -> Vec<WeatherRecord> {
        self.records
    }
}

/// Per-month aggregate of the weather table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: u32,
    pub count: usize,
    pub temperature_mean: f64,
    pub precipitation_total: f64,
    pub humidity_mean: f64,
}

/// A row of the cleaned table: the original record with its temperature
/// imputed, plus the recomputed Fahrenheit value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedRecord {
    pub record: WeatherRecord,
    pub temperature_fahrenheit: f64,
}

impl CleanedRecord {
    /// Temperature after imputation, always present
    pub fn temperature(&self) -> f64 {
        self.record.temperature.unwrap_or(f64::NAN)
    }
}

/// Output of temperature imputation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanedTable {
    pub records: Vec<CleanedRecord>,
    /// Mean used to fill missing temperatures; `None` for an empty table
    pub fill_value: Option<f64>,
    pub imputed: usize,
}

/// Pearson correlation between numeric columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<Column>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Correlation between two numeric columns
    ///
    /// # Errors
    /// Returns `InvalidArgument` if either column is not part of the matrix.
    pub fn get(&self, a: Column, b: Column) -> Result<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Ok(self.values[i][j])
    }

    fn index_of(&self, column: Column) -> Result<usize> {
        self.columns.iter().position(|&c| c == column).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("Column {} is not numeric", column))
        })
    }
}

/// Table-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub row_count: usize,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub correlation: CorrelationMatrix,
    pub missing: Vec<(Column, usize)>,
}

impl TableStats {
    pub fn missing_for(&self, column: Column) -> usize {
        self.missing
            .iter()
            .find(|(c, _)| *c == column)
            .map_or(0, |(_, n)| *n)
    }
}

/// Descriptive statistics of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: Column,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub percentile_25: f64,
    pub median: f64,
    pub percentile_75: f64,
    pub max: f64,
}

/// Configuration for dataset generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub row_count: usize,
    pub seed: u64,
}

impl GeneratorConfig {
    /// # Errors
    /// Returns `InvalidArgument` when `row_count` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.row_count == 0 {
            return Err(PipelineError::InvalidArgument(
                "row_count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            row_count: DEFAULT_ROW_COUNT,
            seed: DEFAULT_SEED,
        }
    }
}

use crate::error::{PipelineError, Result};
use crate::generate::generate_with;
use crate::structs::{
    CleanedTable, Column, DATE_FORMAT, GeneratorConfig, MonthlySummary,
    TEMPERATURE_FAHRENHEIT_HEADER, WeatherRecord, WeatherTable,
};
use arrow_array::{BooleanArray, Float64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ErrorKind, Reader, StringRecord, Writer};
use log::{debug, info};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::io::{Read, Write};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

/// Timestamp layouts accepted when reading a table back
const ACCEPTED_DATE_FORMATS: [&str; 2] = [DATE_FORMAT, "%Y-%m-%dT%H:%M:%S"];

/// Storage lookup used to decide between loading a cached table and
/// generating a fresh one.
pub trait TableStore {
    /// Whether a table with this name is already stored
    fn exists(&self, name: &str) -> bool;
    fn load(&self, name: &str) -> Result<WeatherTable>;
    fn save(&self, name: &str, table: &WeatherTable) -> Result<()>;
}

/// Stores each table as `<root>/<name>.csv`
#[derive(Debug, Clone)]
pub struct CsvDirStore {
    root: PathBuf,
}

impl CsvDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", name))
    }
}

impl TableStore for CsvDirStore {
    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn load(&self, name: &str) -> Result<WeatherTable> {
        read_table_csv(&self.path_for(name))
    }

    fn save(&self, name: &str, table: &WeatherTable) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        write_table_csv(table, &self.path_for(name))
    }
}

/// Where the table returned by [`load_or_generate`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    Loaded,
    Generated,
}

/// Returns the stored table `name` if it exists, otherwise generates one,
/// saves it under `name` and returns it.
///
/// A stored table is used as-is: beyond what is needed to parse it, its
/// schema and contents are not checked against what the generator produces.
///
/// # Errors
///
/// Returns `PipelineError::InvalidArgument` for a bad generator config, and
/// any load or save error from the store.
pub fn load_or_generate<S: TableStore + ?Sized>(
    store: &S,
    name: &str,
    config: &GeneratorConfig,
) -> Result<(WeatherTable, TableSource)> {
    if store.exists(name) {
        let table = store.load(name)?;
        info!("Loaded existing table '{}' ({} rows)", name, table.len());
        return Ok((table, TableSource::Loaded));
    }

    info!("Table '{}' not found, generating it", name);
    let table = generate_with(config)?;
    store.save(name, &table)?;
    info!("Generated and saved table '{}' ({} rows)", name, table.len());
    Ok((table, TableSource::Generated))
}

/// Reads a weather table from a CSV file.
///
/// # Errors
///
/// Returns error if the file cannot be opened, a required column is absent,
/// or a cell cannot be parsed (`PipelineError::MalformedInput`).
pub fn read_table_csv(path: &Path) -> Result<WeatherTable> {
    debug!("Reading CSV file: {}", path.display());
    read_table(File::open(path)?)
}

/// Reads a weather table from any CSV source.
///
/// All eight table columns must be present in the header, in any order.
/// Extra columns are ignored. Empty numeric cells load as missing values.
pub fn read_table<R: Read>(source: R) -> Result<WeatherTable> {
    let mut reader = Reader::from_reader(source);
    let headers = reader
        .headers()
        .map_err(|e| malformed_csv(e, 1))?
        .clone();
    let positions = Column::ALL
        .into_iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h.trim() == column.name())
                .ok_or_else(|| {
                    PipelineError::MalformedInput(format!("Column not found: {}", column))
                })
        })
        .collect::<Result<Vec<usize>>>()?;
    let cell = |row: &StringRecord, column: Column| -> String {
        row.get(positions[column as usize]).unwrap_or("").trim().to_string()
    };

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let row = row.map_err(|e| malformed_csv(e, line))?;
        let numeric = |column: Column| parse_optional_f64(&cell(&row, column), column, line);
        records.push(WeatherRecord {
            timestamp: parse_timestamp(&cell(&row, Column::Date), line)?,
            temperature: numeric(Column::Temperature)?,
            precipitation: numeric(Column::Precipitation)?,
            humidity: numeric(Column::Humidity)?,
            latitude: numeric(Column::Latitude)?,
            longitude: numeric(Column::Longitude)?,
            temperature_f: numeric(Column::TemperatureF)?,
            is_hot: parse_flag(&cell(&row, Column::IsHot), line)?,
        });
    }

    debug!("Read {} rows", records.len());
    Ok(WeatherTable::new(records))
}

/// Short rows and non UTF-8 cells are malformed input; anything else stays a CSV error.
fn malformed_csv(err: csv::Error, line: usize) -> PipelineError {
    let malformed = matches!(
        err.kind(),
        ErrorKind::UnequalLengths { .. } | ErrorKind::Utf8 { .. }
    );
    if !malformed {
        return PipelineError::Csv(err);
    }
    let line = err.position().map_or(line as u64, |p| p.line());
    PipelineError::MalformedInput(format!("Line {}: {}", line, err))
}

fn parse_timestamp(value: &str, line: usize) -> Result<NaiveDateTime> {
    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            PipelineError::MalformedInput(format!("Line {}: unparsable timestamp '{}'", line, value))
        })
}

fn parse_optional_f64(value: &str, column: Column, line: usize) -> Result<Option<f64>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed: f64 = value.parse().map_err(|_| {
        PipelineError::MalformedInput(format!(
            "Line {}: column {} is not a number: '{}'",
            line, column, value
        ))
    })?;
    Ok(if parsed.is_nan() { None } else { Some(parsed) })
}

fn parse_flag(value: &str, line: usize) -> Result<bool> {
    match value {
        "1" | "true" | "True" => Ok(true),
        "0" | "false" | "False" => Ok(false),
        _ => Err(PipelineError::MalformedInput(format!(
            "Line {}: column {} is not a flag: '{}'",
            line,
            Column::IsHot,
            value
        ))),
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn table_row(record: &WeatherRecord) -> Vec<String> {
    vec![
        record.timestamp.format(DATE_FORMAT).to_string(),
        format_optional(record.temperature),
        format_optional(record.precipitation),
        format_optional(record.humidity),
        format_optional(record.latitude),
        format_optional(record.longitude),
        format_optional(record.temperature_f),
        u8::from(record.is_hot).to_string(),
    ]
}

/// Writes the weather table as CSV with the standard header.
///
/// Numbers are written in their shortest exact form so a table read back
/// from the file compares equal to the one written.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_table_csv(table: &WeatherTable, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    write_table(table, file)
}

/// Writes the weather table as CSV to any sink.
pub fn write_table<W: Write>(table: &WeatherTable, sink: W) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    writer.write_record(Column::ALL.map(Column::name))?;
    for record in table.records() {
        writer.write_record(table_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the cleaned table: the standard columns followed by
/// `Temperature_Fahrenheit`.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_cleaned_csv(cleaned: &CleanedTable, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    let mut header: Vec<&str> = Column::ALL.map(Column::name).to_vec();
    header.push(TEMPERATURE_FAHRENHEIT_HEADER);
    writer.write_record(&header)?;

    for row in &cleaned.records {
        let mut fields = table_row(&row.record);
        fields.push(row.temperature_fahrenheit.to_string());
        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes monthly summaries to CSV with formatted numeric values.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_summary_csv(summaries: &[MonthlySummary], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "Month",
        "Count",
        "Temperature_mean",
        "Precipitation_total",
        "Humidity_mean",
    ])?;

    for summary in summaries {
        writer.write_record(&[
            summary.month.to_string(),
            summary.count.to_string(),
            format!("{:.2}", summary.temperature_mean),
            format!("{:.2}", summary.precipitation_total),
            format!("{:.2}", summary.humidity_mean),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes any serializable value to a pretty-formatted JSON file.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Writes the weather table to a columnar Parquet file using Arrow format.
///
/// Measured columns are nullable Float64, `Is_Hot` is Boolean and `Date` is
/// a UTF-8 string in the table date format.
///
/// # Errors
/// Returns error if file cannot be created, schema is invalid, or Arrow operations fail.
pub fn write_parquet(table: &WeatherTable, output_path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(Column::Date.name(), DataType::Utf8, false),
        Field::new(Column::Temperature.name(), DataType::Float64, true),
        Field::new(Column::Precipitation.name(), DataType::Float64, true),
        Field::new(Column::Humidity.name(), DataType::Float64, true),
        Field::new(Column::Latitude.name(), DataType::Float64, true),
        Field::new(Column::Longitude.name(), DataType::Float64, true),
        Field::new(Column::TemperatureF.name(), DataType::Float64, true),
        Field::new(Column::IsHot.name(), DataType::Boolean, false),
    ]));

    let records = table.records();
    let dates = StringArray::from_iter_values(
        records
            .iter()
            .map(|r| r.timestamp.format(DATE_FORMAT).to_string()),
    );
    let numeric = |column: Column| -> Float64Array {
        records.iter().map(|r| r.numeric(column)).collect()
    };
    let hot = BooleanArray::from(records.iter().map(|r| r.is_hot).collect::<Vec<bool>>());

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(dates),
            Arc::new(numeric(Column::Temperature)),
            Arc::new(numeric(Column::Precipitation)),
            Arc::new(numeric(Column::Humidity)),
            Arc::new(numeric(Column::Latitude)),
            Arc::new(numeric(Column::Longitude)),
            Arc::new(numeric(Column::TemperatureF)),
            Arc::new(hot),
        ],
    )?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Temperature,Precipitation,Humidity,Latitude,Longitude,Temperature_F,Is_Hot\n";

    #[test]
    fn test_read_table_with_missing_cells() {
        let data = format!(
            "{}2023-01-01 05:00:00,12.5,0,55.1,10.0,20.0,54.5,0\n2023-02-03 00:00:00,,5,,1,2,,1\n",
            HEADER
        );
        let table = read_table(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let second = &table.records()[1];
        assert_eq!(second.temperature, None);
        assert_eq!(second.humidity, None);
        assert_eq!(second.precipitation, Some(5.0));
        assert!(second.is_hot);
        assert_eq!(second.month(), 2);
    }

    #[test]
    fn test_read_table_extra_column_and_reordered_header() {
        let data = "Is_Hot,Date,Temperature_Fahrenheit,Temperature,Precipitation,Humidity,Latitude,Longitude,Temperature_F\n\
                    1,2023-07-01T13:00:00,80.6,27.0,0,60,1,1,80.6\n";
        let table = read_table(data.as_bytes()).unwrap();
        let r = &table.records()[0];
        assert_eq!(r.temperature, Some(27.0));
        assert!(r.is_hot);
        assert_eq!(r.month(), 7);
    }

    #[test]
    fn test_read_table_missing_column() {
        let data = "Date,Temperature,Precipitation\n2023-01-01,1,0\n";
        let err = read_table(data.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(ref m) if m.contains("Humidity")));
    }

    #[test]
    fn test_read_table_bad_timestamp() {
        let data = format!("{}yesterday,1,0,50,0,0,33.8,0\n", HEADER);
        let err = read_table(data.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(ref m) if m.contains("Line 2")));
    }

    #[test]
    fn test_read_table_bad_number() {
        let data = format!("{}2023-01-01,warm,0,50,0,0,33.8,0\n", HEADER);
        assert!(matches!(
            read_table(data.as_bytes()),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_read_table_short_row() {
        let data = format!("{}2023-01-01 00:00:00,1,0,50\n", HEADER);
        let err = read_table(data.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(ref m) if m.contains("Line 2")));
    }

    #[test]
    fn test_read_table_invalid_utf8() {
        let mut data = HEADER.as_bytes().to_vec();
        data.extend_from_slice(b"2023-01-01 00:00:00,1,0,50,0,0,33.8,");
        data.extend_from_slice(&[0xff, 0xfe]);
        data.push(b'\n');
        let err = read_table(data.as_slice()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn test_read_table_invalid_utf8_header() {
        let data: &[u8] = &[b'D', 0xff, b',', b'x', b'\n'];
        assert!(matches!(
            read_table(data),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_bare_date_is_midnight() {
        let ts = parse_timestamp("2023-03-04", 2).unwrap();
        assert_eq!(ts.format(DATE_FORMAT).to_string(), "2023-03-04 00:00:00");
    }

    #[test]
    fn test_write_then_read_is_identical() {
        let table = crate::generate::generate(50, 8).unwrap();
        let mut buffer = Vec::new();
        write_table(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with(HEADER));
        assert_eq!(read_table(buffer.as_slice()).unwrap(), table);
    }
}

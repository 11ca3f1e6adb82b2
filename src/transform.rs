use crate::error::{PipelineError, Result};
use crate::structs::{
    CleanedRecord, CleanedTable, Column, ColumnSummary, CorrelationMatrix, MonthlySummary,
    TableStats, WeatherRecord, WeatherTable,
};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Converts a Celsius temperature to Fahrenheit.
///
/// Both the generator and the cleaning step go through this function so a
/// recomputed column is bit-identical to the generated one.
pub fn celsius_to_fahrenheit(temp_celsius: f64) -> f64 {
    temp_celsius * 9.0 / 5.0 + 32.0
}

/// Aggregates the weather table per calendar month.
///
/// Rows are grouped by the month of their timestamp (keeping table order
/// inside each group) and every month is reduced on its own, so the output
/// does not depend on how the months are scheduled across threads.
///
/// # Arguments
///
/// * `table` - Weather table to aggregate, left untouched
///
/// # Returns
///
/// One `MonthlySummary` per month that has at least one row, ascending by
/// month. An empty table yields an empty vector. Missing values are skipped;
/// a month without any present temperature (or humidity) reports `NaN` for
/// that mean.
pub fn summarize(table: &WeatherTable) -> Vec<MonthlySummary> {
    let mut monthly: BTreeMap<u32, Vec<&WeatherRecord>> = BTreeMap::new();
    for record in table.records() {
        monthly.entry(record.month()).or_default().push(record);
    }
    debug!(
        "Grouped {} rows into {} months",
        table.len(),
        monthly.len()
    );

    let entries: Vec<_> = monthly.into_iter().collect();
    let mut results: Vec<MonthlySummary> = entries
        .into_par_iter()
        .map(|(month, rows)| summarize_month(month, &rows))
        .collect();

    results.sort_by_key(|s| s.month);
    results
}

fn summarize_month(month: u32, rows: &[&WeatherRecord]) -> MonthlySummary {
    MonthlySummary {
        month,
        count: rows.len(),
        temperature_mean: mean_present(rows.iter().map(|r| r.temperature)),
        precipitation_total: rows.iter().filter_map(|r| r.precipitation).sum(),
        humidity_mean: mean_present(rows.iter().map(|r| r.humidity)),
    }
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Month with the highest precipitation total; the lowest month wins a tie.
pub fn wettest_month(summaries: &[MonthlySummary]) -> Option<&MonthlySummary> {
    first_max_by(summaries, |s| s.precipitation_total)
}

/// Month with the highest mean temperature; the lowest month wins a tie.
pub fn warmest_month(summaries: &[MonthlySummary]) -> Option<&MonthlySummary> {
    first_max_by(summaries, |s| s.temperature_mean)
}

/// Difference between the most and least humid month means.
pub fn humidity_spread(summaries: &[MonthlySummary]) -> Option<f64> {
    let means = summaries
        .iter()
        .map(|s| s.humidity_mean)
        .filter(|v| !v.is_nan());
    let (min, max) = means.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;
    Some(max - min)
}

/// Looks up the summary row of one month.
///
/// # Errors
///
/// Returns `PipelineError::InvalidArgument` if `month` is not in 1..=12.
/// A valid month with no rows gives `Ok(None)`.
pub fn month_summary(summaries: &[MonthlySummary], month: u32) -> Result<Option<&MonthlySummary>> {
    if !(1..=12).contains(&month) {
        return Err(PipelineError::InvalidArgument(format!(
            "Month out of range: {}",
            month
        )));
    }
    Ok(summaries.iter().find(|s| s.month == month))
}

// NaN keys never win; equal keys keep the lower month.
fn first_max_by(
    summaries: &[MonthlySummary],
    key: impl Fn(&MonthlySummary) -> f64,
) -> Option<&MonthlySummary> {
    let mut best: Option<&MonthlySummary> = None;
    for candidate in summaries {
        let value = key(candidate);
        if value.is_nan() {
            continue;
        }
        match best {
            Some(current)
                if key(current) > value
                    || (key(current) == value && current.month <= candidate.month) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Computes table-wide statistics.
///
/// # Returns
///
/// A `TableStats` holding:
/// - **Temperature range**: min and max over present values (`None` if there are none)
/// - **Correlation**: Pearson matrix over every numeric column, using the rows
///   where both columns are present
/// - **Missing values**: per-column count of empty cells
pub fn table_stats(table: &WeatherTable) -> TableStats {
    let temps = table.values(Column::Temperature);
    let temperature_min = temps.iter().copied().reduce(f64::min);
    let temperature_max = temps.iter().copied().reduce(f64::max);

    let missing: Vec<(Column, usize)> = Column::ALL
        .into_iter()
        .map(|column| (column, missing_count(table, column)))
        .collect();
    let total_missing: usize = missing.iter().map(|(_, n)| n).sum();
    if total_missing > 0 {
        info!("Table has {} missing values", total_missing);
    }

    TableStats {
        row_count: table.len(),
        temperature_min,
        temperature_max,
        correlation: correlation_matrix(table),
        missing,
    }
}

fn missing_count(table: &WeatherTable, column: Column) -> usize {
    if !column.is_numeric() {
        return 0;
    }
    table
        .records()
        .iter()
        .filter(|r| r.numeric(column).is_none())
        .count()
}

/// Pairwise Pearson correlation over all numeric columns.
pub fn correlation_matrix(table: &WeatherTable) -> CorrelationMatrix {
    let columns = Column::NUMERIC.to_vec();
    let values: Vec<Vec<f64>> = columns
        .par_iter()
        .map(|&a| columns.iter().map(|&b| pearson(table, a, b)).collect())
        .collect();
    CorrelationMatrix { columns, values }
}

fn pearson(table: &WeatherTable, a: Column, b: Column) -> f64 {
    let pairs: Vec<(f64, f64)> = table
        .records()
        .iter()
        .filter_map(|r| Some((r.numeric(a)?, r.numeric(b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    if a == b {
        return 1.0;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Descriptive statistics for every numeric column, like a dataframe `describe`.
///
/// Standard deviation uses the N-1 denominator; percentiles use linear
/// interpolation. Statistics of a column without present values are `NaN`.
pub fn describe(table: &WeatherTable) -> Vec<ColumnSummary> {
    Column::NUMERIC
        .par_iter()
        .map(|&column| describe_column(column, &table.values(column)))
        .collect()
}

fn describe_column(column: Column, values: &[f64]) -> ColumnSummary {
    let count = values.len();
    let mean = if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / count as f64
    };
    let std_dev = if count > 1 {
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        f64::NAN
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ColumnSummary {
        column,
        count,
        mean,
        std_dev,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        percentile_25: calculate_percentile(&sorted, 25.0),
        median: calculate_percentile(&sorted, 50.0),
        percentile_75: calculate_percentile(&sorted, 75.0),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

/// Percentile of already sorted data using linear interpolation.
/// Returns `NaN` for an empty slice.
fn calculate_percentile(sorted_data: &[f64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Fills missing temperatures with the column mean and recomputes Fahrenheit.
///
/// The mean is taken once over the present temperatures before any value is
/// filled. Every other field is carried over unchanged, including the stored
/// `Temperature_F` and `Is_Hot` flags.
///
/// # Errors
///
/// Returns `PipelineError::MalformedInput` if the table has rows but no
/// temperature at all to derive a fill value from.
pub fn impute_temperature(table: &WeatherTable) -> Result<CleanedTable> {
    if table.is_empty() {
        return Ok(CleanedTable::default());
    }

    let present = table.values(Column::Temperature);
    if present.is_empty() {
        return Err(PipelineError::MalformedInput(
            "No temperature values to impute from".to_string(),
        ));
    }
    let fill_value = present.iter().sum::<f64>() / present.len() as f64;

    let mut imputed = 0;
    let records: Vec<CleanedRecord> = table
        .records()
        .iter()
        .map(|r| {
            let temperature = r.temperature.unwrap_or_else(|| {
                imputed += 1;
                fill_value
            });
            let mut record = r.clone();
            record.temperature = Some(temperature);
            CleanedRecord {
                record,
                temperature_fahrenheit: celsius_to_fahrenheit(temperature),
            }
        })
        .collect();

    debug!(
        "Imputed {} missing temperatures with mean {:.3}",
        imputed, fill_value
    );
    Ok(CleanedTable {
        records,
        fill_value: Some(fill_value),
        imputed,
    })
}

/// Rows whose temperature is strictly above `threshold_c`.
pub fn hot_days(table: &WeatherTable, threshold_c: f64) -> Vec<&WeatherRecord> {
    table
        .records()
        .iter()
        .filter(|r| r.temperature.is_some_and(|t| t > threshold_c))
        .collect()
}

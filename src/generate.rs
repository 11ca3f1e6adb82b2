use crate::error::{PipelineError, Result};
use crate::structs::{GeneratorConfig, HOT_THRESHOLD_C, WeatherRecord, WeatherTable};
use crate::transform::celsius_to_fahrenheit;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use std::f64::consts::PI;

const YEAR: i32 = 2023;
/// Hourly slots from Jan 1 00:00 up to and including Dec 31 00:00
const HOURLY_SLOTS: i64 = 364 * 24 + 1;
const DAYS_PER_PERIOD: f64 = 365.0;

const TEMP_OFFSET: f64 = 10.0;
const TEMP_AMPLITUDE: f64 = 15.0;
const TEMP_NOISE_STD: f64 = 3.0;

const HUMIDITY_OFFSET: f64 = 50.0;
const HUMIDITY_AMPLITUDE: f64 = 20.0;
const HUMIDITY_NOISE_STD: f64 = 10.0;
const HUMIDITY_MIN: f64 = 30.0;
const HUMIDITY_MAX: f64 = 100.0;

// 0 is listed twice on purpose: this is the literal sampling table.
const PRECIPITATION_VALUES: [f64; 6] = [0.0, 0.0, 5.0, 10.0, 15.0, 20.0];
const PRECIPITATION_WEIGHTS: [f64; 6] = [0.6, 0.2, 0.1, 0.05, 0.03, 0.02];

/// Generates a synthetic weather table.
///
/// Timestamps are drawn uniformly with replacement from the 2023 hourly grid.
/// Temperature and humidity follow a yearly sinusoid keyed on the day of year
/// plus Gaussian noise; precipitation comes from a fixed categorical table and
/// the coordinates are uniform. The result is sorted by timestamp.
///
/// # Arguments
///
/// * `row_count` - Number of rows, must be positive
/// * `seed` - Seed for every random draw; equal seeds give identical tables
///
/// # Errors
///
/// Returns `PipelineError::InvalidArgument` if `row_count` is zero.
pub fn generate(row_count: usize, seed: u64) -> Result<WeatherTable> {
    generate_with(&GeneratorConfig { row_count, seed })
}

/// Same as [`generate`], driven by a [`GeneratorConfig`].
pub fn generate_with(config: &GeneratorConfig) -> Result<WeatherTable> {
    config.validate()?;
    let n = config.row_count;
    debug!("Generating {} rows with seed {}", n, config.seed);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let start = year_start()?;

    // Each column is drawn in full before the next.
    let timestamps: Vec<NaiveDateTime> = (0..n)
        .map(|_| start + Duration::hours(rng.gen_range(0..HOURLY_SLOTS)))
        .collect();
    let seasons: Vec<f64> = timestamps.iter().map(|t| seasonal(t.ordinal())).collect();

    let temp_noise = normal(TEMP_NOISE_STD)?;
    let temperatures: Vec<f64> = seasons
        .iter()
        .map(|s| round_1(TEMP_OFFSET + TEMP_AMPLITUDE * s + temp_noise.sample(&mut rng)))
        .collect();

    let precip_index = WeightedIndex::new(&PRECIPITATION_WEIGHTS).map_err(|e| {
        PipelineError::InvalidArgument(format!("Bad precipitation weights: {}", e))
    })?;
    let precipitation: Vec<f64> = (0..n)
        .map(|_| PRECIPITATION_VALUES[precip_index.sample(&mut rng)])
        .collect();

    let humidity_noise = normal(HUMIDITY_NOISE_STD)?;
    let humidity: Vec<f64> = seasons
        .iter()
        .map(|s| {
            let raw = HUMIDITY_OFFSET + HUMIDITY_AMPLITUDE * s + humidity_noise.sample(&mut rng);
            round_1(raw.clamp(HUMIDITY_MIN, HUMIDITY_MAX))
        })
        .collect();

    let latitudes: Vec<f64> = (0..n).map(|_| rng.gen_range(-90.0..90.0)).collect();
    let longitudes: Vec<f64> = (0..n).map(|_| rng.gen_range(-180.0..180.0)).collect();

    let mut records: Vec<WeatherRecord> = (0..n)
        .map(|i| {
            let temperature = temperatures[i];
            WeatherRecord {
                timestamp: timestamps[i],
                temperature: Some(temperature),
                precipitation: Some(precipitation[i]),
                humidity: Some(humidity[i]),
                latitude: Some(latitudes[i]),
                longitude: Some(longitudes[i]),
                temperature_f: Some(celsius_to_fahrenheit(temperature)),
                is_hot: temperature > HOT_THRESHOLD_C,
            }
        })
        .collect();

    records.sort_by_key(|r| r.timestamp);
    debug!(
        "Generated {} rows spanning {:?} to {:?}",
        records.len(),
        records.first().map(|r| r.timestamp),
        records.last().map(|r| r.timestamp)
    );

    Ok(WeatherTable::new(records))
}

fn year_start() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(YEAR, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PipelineError::InvalidArgument(format!("Bad start year {}", YEAR)))
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev)
        .map_err(|e| PipelineError::InvalidArgument(format!("Bad noise parameters: {}", e)))
}

/// Yearly sinusoid in [-1, 1] for a 1-based day of year
fn seasonal(day_of_year: u32) -> f64 {
    (2.0 * PI * f64::from(day_of_year) / DAYS_PER_PERIOD).sin()
}

/// Rounds to one decimal, ties to even
fn round_1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::DEFAULT_SEED;

    #[test]
    fn test_row_count_and_order() {
        let table = generate(1000, DEFAULT_SEED).unwrap();
        assert_eq!(table.len(), 1000);
        assert!(
            table
                .records()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn test_derived_columns_hold() {
        let table = generate(500, 7).unwrap();
        for r in table.records() {
            let t = r.temperature.unwrap();
            assert_eq!(r.temperature_f, Some(t * 9.0 / 5.0 + 32.0));
            assert_eq!(r.is_hot, t > 25.0);
        }
    }

    #[test]
    fn test_value_ranges() {
        let table = generate(2000, 3).unwrap();
        let start = year_start().unwrap();
        let end = start + Duration::hours(HOURLY_SLOTS - 1);
        for r in table.records() {
            assert!(r.timestamp >= start && r.timestamp <= end);
            assert_eq!(r.timestamp.format("%M:%S").to_string(), "00:00");
            let h = r.humidity.unwrap();
            assert!((HUMIDITY_MIN..=HUMIDITY_MAX).contains(&h));
            assert!(PRECIPITATION_VALUES.contains(&r.precipitation.unwrap()));
            let lat = r.latitude.unwrap();
            let lon = r.longitude.unwrap();
            assert!((-90.0..90.0).contains(&lat));
            assert!((-180.0..180.0).contains(&lon));
            // one decimal place
            let t = r.temperature.unwrap();
            assert!(((t * 10.0).round() - t * 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = generate(300, 99).unwrap();
        let b = generate(300, 99).unwrap();
        assert_eq!(a, b);
        let c = generate(300, 100).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_rows_is_invalid() {
        assert!(matches!(
            generate(0, 1),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dry_rows_dominate() {
        let table = generate(5000, 11).unwrap();
        let dry = table
            .records()
            .iter()
            .filter(|r| r.precipitation == Some(0.0))
            .count();
        // expected share 0.8
        assert!(dry > 3700 && dry < 4300, "dry rows: {}", dry);
    }

    #[test]
    fn test_round_ties_even() {
        assert_eq!(round_1(0.25), 0.2);
        assert_eq!(round_1(12.34), 12.3);
        assert_eq!(round_1(-3.06), -3.1);
    }
}

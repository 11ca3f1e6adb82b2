use clap::Parser;
use lib::structs::{DEFAULT_ROW_COUNT, DEFAULT_SEED, HOT_DAY_FILTER_C};
use lib::{
    CsvDirStore, GeneratorConfig, PipelineError, SimpleLogger, TableSource, describe, hot_days,
    humidity_spread, impute_temperature, load_or_generate, summarize, table_stats,
    warmest_month, wettest_month, write_cleaned_csv, write_json, write_parquet,
    write_summary_csv,
};
use log::debug;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the cached weather table
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Table name (file will be <data-dir>/<name>.csv)
    #[arg(short, long, default_value = "weather_data_1000")]
    name: String,

    /// Rows to generate when the table does not exist yet
    #[arg(short, long, default_value_t = DEFAULT_ROW_COUNT)]
    rows: usize,

    /// Seed for generation
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Output base name (will create dir containing .csv, .json, and .parquet files)
    #[arg(short, long, default_value = "output")]
    output: String,

    /// Temperature (°C) above which a row is listed as a hot day
    #[arg(long, default_value_t = HOT_DAY_FILTER_C)]
    hot_threshold: f64,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER)?;

    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    println!("Weather Insights! Synthetic weather analysis");
    debug!(
        "Data dir: {} | Table: {} | Rows: {} | Seed: {}",
        args.data_dir.display(),
        args.name,
        args.rows,
        args.seed
    );

    let config = GeneratorConfig {
        row_count: args.rows,
        seed: args.seed,
    };
    let store = CsvDirStore::new(&args.data_dir);
    let (table, source) = load_or_generate(&store, &args.name, &config)?;
    match source {
        TableSource::Loaded => println!("Loaded {} rows from cache", table.len()),
        TableSource::Generated => println!("Generated {} rows", table.len()),
    }

    // Table-wide statistics
    let analysis_start = Instant::now();
    let stats = table_stats(&table);
    println!("Rows: {} | Columns: {}", stats.row_count, stats.missing.len());
    match (stats.temperature_min, stats.temperature_max) {
        (Some(min), Some(max)) => println!("Temperature min: {}°C | max: {}°C", min, max),
        _ => println!("No temperature values present"),
    }
    for (column, missing) in &stats.missing {
        debug!("Missing values in {}: {}", column, missing);
    }
    let column_summaries = describe(&table);

    let cleaned = impute_temperature(&table)?;
    let hot = hot_days(&table, args.hot_threshold);
    println!(
        "Rows above {}°C: {} | Imputed temperatures: {}",
        args.hot_threshold,
        hot.len(),
        cleaned.imputed
    );

    // Monthly aggregation
    let monthly = summarize(&table);
    for summary in &monthly {
        println!(
            "Month {:>2}: temp={:.2}°C precip={:.1}mm humidity={:.2}% ({} rows)",
            summary.month,
            summary.temperature_mean,
            summary.precipitation_total,
            summary.humidity_mean,
            summary.count
        );
    }
    if let Some(wettest) = wettest_month(&monthly) {
        println!(
            "Wettest month: {} with {} mm",
            wettest.month, wettest.precipitation_total
        );
    }
    if let Some(warmest) = warmest_month(&monthly) {
        println!(
            "Warmest month: {} with {:.2}°C",
            warmest.month, warmest.temperature_mean
        );
    }
    if let Some(spread) = humidity_spread(&monthly) {
        println!("Humidity spread between months: {:.2}", spread);
    }
    let analysis_time = analysis_start.elapsed();
    println!("Analysis completed in {:.2?}", analysis_time);

    // Create output directory
    let output_dir = PathBuf::from(format!("./output/{}", args.output));
    fs::create_dir_all(&output_dir)?;
    println!(
        "Created output directory: {} | Writing output files...",
        output_dir.display()
    );
    let io_start = Instant::now();

    let output_name = args
        .output
        .split(['/', '\\'])
        .next_back()
        .unwrap_or(&args.output);
    let transformed_path = output_dir.join("weather_data_transformed.csv");
    let monthly_csv_path = output_dir.join(format!("{}_monthly.csv", output_name));
    let monthly_json_path = output_dir.join(format!("{}_monthly.json", output_name));
    let stats_path = output_dir.join(format!("{}_stats.json", output_name));
    let describe_path = output_dir.join(format!("{}_describe.json", output_name));
    let parquet_path = output_dir.join(format!("{}.parquet", output_name));

    write_cleaned_csv(&cleaned, &transformed_path)?;
    write_summary_csv(&monthly, &monthly_csv_path)?;
    write_json(&monthly, &monthly_json_path)?;
    write_json(&stats, &stats_path)?;
    write_json(&column_summaries, &describe_path)?;
    write_parquet(&table, &parquet_path)?;

    let io_time = io_start.elapsed();
    println!("All files took {:.2?}", io_time);
    println!("\nWrote files to directory: {}", output_dir.display());
    for path in [
        &transformed_path,
        &monthly_csv_path,
        &monthly_json_path,
        &stats_path,
        &describe_path,
        &parquet_path,
    ] {
        debug!("  - {}", path.display());
    }

    let total_time = total_start.elapsed();
    println!("Pipeline completed successfully in {:.2?}", total_time);
    Ok(())
}

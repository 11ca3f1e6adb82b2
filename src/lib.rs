pub mod error;
pub mod generate;
pub mod load;
pub mod structs;
pub mod transform;

// Re-export public API
pub use error::{PipelineError, Result};
pub use generate::{generate, generate_with};
pub use load::{
    CsvDirStore, TableSource, TableStore, load_or_generate, read_table_csv, write_cleaned_csv,
    write_json, write_parquet, write_summary_csv, write_table_csv,
};
pub use structs::{
    CleanedRecord, CleanedTable, Column, ColumnSummary, CorrelationMatrix, GeneratorConfig,
    MonthlySummary, SimpleLogger, TableStats, WeatherRecord, WeatherTable,
};
pub use transform::{
    celsius_to_fahrenheit, describe, hot_days, humidity_spread, impute_temperature,
    month_summary, summarize, table_stats, warmest_month, wettest_month,
};

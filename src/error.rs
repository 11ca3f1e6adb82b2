use arrow_schema::ArrowError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
    #[error("Malformed Input: {0}")]
    MalformedInput(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Logger Error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::SimpleLogger;

    static LOGGER: SimpleLogger = SimpleLogger;

    fn install() -> Result<()> {
        log::set_logger(&LOGGER)?;
        Ok(())
    }

    #[test]
    fn test_second_logger_install_is_logger_error() {
        let _ = install();
        assert!(matches!(install(), Err(PipelineError::Logger(_))));
    }
}

use thiserror::Error;

pub type FunnelResult<T> = Result<T, FunnelError>;

#[derive(Error, Debug)]
pub enum FunnelError {
    #[error("Unsupported input format: {0} (expected .csv, .xlsx, .xlsm or .xls)")]
    UnsupportedFormat(String),

    #[error("Schema error: missing column '{column}' for required field {role}")]
    Schema { role: String, column: String },

    #[error("Data type error at row {row}, column '{column}': {value:?} is not {expected}")]
    DataType {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Input read error: {0}")]
    Read(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

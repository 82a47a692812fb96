pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, ColumnMapping, ColumnRole};
pub use error::{FunnelError, FunnelResult};

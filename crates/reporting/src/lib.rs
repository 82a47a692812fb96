//! Click-stream funnel analysis: cleaning, funnel metrics, module ranking,
//! narrative insights and report export.

pub mod cleaner;
pub mod funnel;
pub mod insight;
pub mod metrics;
pub mod ranker;
pub mod report_builder;

pub use cleaner::clean;
pub use funnel::{analyze, AnalysisResult};
pub use insight::{generate_insights, LossBreakdown, LossStage};
pub use metrics::{compute_grouped_metrics, compute_metrics};
pub use ranker::{rank, sort_by_ctr};
pub use report_builder::{ranking_to_csv, to_json, to_markdown, ExportFormat};

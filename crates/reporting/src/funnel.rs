//! Funnel analysis pipeline: clean, measure, rank and explain one dataset.

use chrono::{DateTime, Utc};
use funnel_core::types::{
    CleaningStats, Dataset, FunnelMetrics, GroupKey, GroupMetrics, Insight, ModuleRanking,
};
use funnel_core::{AnalysisConfig, FunnelResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cleaner::clean;
use crate::insight::{generate_insights, LossBreakdown};
use crate::metrics::{compute_grouped_metrics, compute_metrics};
use crate::ranker::{rank, sort_by_ctr};

/// Everything produced by a single analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    /// Configuration the run used, after CLI and environment overrides.
    pub config: AnalysisConfig,
    pub cleaning_stats: CleaningStats,
    pub overall: FunnelMetrics,
    pub ranking: ModuleRanking,
    /// Every event group in CTR order, not truncated.
    pub event_metrics: Vec<GroupMetrics>,
    pub platform_breakdown: Option<Vec<GroupMetrics>>,
    /// Most recent `trend_days` dates, oldest first.
    pub date_trend: Option<Vec<GroupMetrics>>,
    pub loss: LossBreakdown,
    pub insights: Vec<Insight>,
}

impl AnalysisResult {
    pub fn records_analyzed(&self) -> usize {
        self.cleaning_stats.after_anomaly_filter
    }
}

/// Runs the full pipeline over `dataset`. The input is left untouched.
///
/// An empty dataset, before or after cleaning, is not an error: every
/// ratio comes out as 0 and the ranking is empty.
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> FunnelResult<AnalysisResult> {
    config.validate()?;
    let run_id = Uuid::new_v4();
    info!(%run_id, source = %dataset.source, rows = dataset.len(), "Starting funnel analysis");

    let (cleaned, cleaning_stats) = clean(dataset, config.min_click_threshold);
    let overall = compute_metrics(cleaned.iter());

    let event_metrics = sort_by_ctr(&compute_grouped_metrics(&cleaned, GroupKey::Event));
    let ranking = rank(&event_metrics, config.top_n);

    let platform_breakdown = cleaned
        .has_platform
        .then(|| compute_grouped_metrics(&cleaned, GroupKey::Platform));
    let date_trend = cleaned.has_date.then(|| {
        let mut trend = compute_grouped_metrics(&cleaned, GroupKey::Date);
        let skip = trend.len().saturating_sub(config.trend_days);
        trend.drain(..skip);
        trend
    });

    let loss = LossBreakdown::from_metrics(&overall);
    let insights = generate_insights(
        &overall,
        &ranking,
        Some(event_metrics.as_slice()),
        &config.insights,
    );

    info!(
        %run_id,
        records = cleaning_stats.after_anomaly_filter,
        events = event_metrics.len(),
        ranked = ranking.len(),
        ctr = overall.ctr,
        dominant_loss = %loss.dominant,
        "Funnel analysis complete"
    );

    Ok(AnalysisResult {
        run_id,
        generated_at: Utc::now(),
        source: dataset.source.clone(),
        config: config.clone(),
        cleaning_stats,
        overall,
        ranking,
        event_metrics,
        platform_breakdown,
        date_trend,
        loss,
        insights,
    })
}

//! Funnel data model shared by the loader, the metrics pipeline and exports.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Input ──────────────────────────────────────────────────────────────────

/// One row of a click-stream export.
///
/// Counts are `None` when the source cell was empty. Cleaning guarantees
/// that surviving records carry both `exposure` and `click`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub exposure: Option<u64>,
    pub click: Option<u64>,
    pub submit: Option<u64>,
    pub order: Option<u64>,
    pub event_name: Option<String>,
    pub platform: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Record {
    /// A fully populated record without platform or date.
    pub fn new(
        event_name: impl Into<String>,
        exposure: u64,
        click: u64,
        submit: u64,
        order: u64,
    ) -> Self {
        Self {
            exposure: Some(exposure),
            click: Some(click),
            submit: Some(submit),
            order: Some(order),
            event_name: Some(event_name.into()),
            platform: None,
            date: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Ordered rows sharing one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// File name or other label of the input.
    pub source: String,
    pub records: Vec<Record>,
    /// Whether the source carried a platform column.
    pub has_platform: bool,
    /// Whether the source carried a date column.
    pub has_date: bool,
}

impl Dataset {
    pub fn new(source: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            source: source.into(),
            records,
            has_platform: false,
            has_date: false,
        }
    }

    pub fn with_optional_columns(mut self, has_platform: bool, has_date: bool) -> Self {
        self.has_platform = has_platform;
        self.has_date = has_date;
        self
    }

    /// Same source and schema, different rows.
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            source: self.source.clone(),
            records,
            has_platform: self.has_platform,
            has_date: self.has_date,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

// ─── Metrics ────────────────────────────────────────────────────────────────

/// Summed funnel counts with derived ratios.
///
/// Ratios are percentages rounded to 2 decimals and are 0 when their
/// denominator is 0. `order_cvr` is order / click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelMetrics {
    pub exposure: u64,
    pub click: u64,
    pub submit: u64,
    pub order: u64,
    pub ctr: f64,
    pub click_cvr: f64,
    pub order_cvr: f64,
}

/// Dimension used to partition a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Event,
    Platform,
    Date,
}

impl GroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKey::Event => "event",
            GroupKey::Platform => "platform",
            GroupKey::Date => "date",
        }
    }
}

/// Metrics for one value of a [`GroupKey`]. Dates are keyed as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub key: String,
    pub metrics: FunnelMetrics,
}

// ─── Ranking ────────────────────────────────────────────────────────────────

/// Coarse CTR band used to highlight ranking rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrTier {
    High,
    Medium,
    Low,
}

impl CtrTier {
    pub fn from_ctr(ctr: f64) -> Self {
        if ctr >= 50.0 {
            CtrTier::High
        } else if ctr >= 20.0 {
            CtrTier::Medium
        } else {
            CtrTier::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedModule {
    /// 1-based position.
    pub rank: usize,
    pub event_name: String,
    pub metrics: FunnelMetrics,
}

impl RankedModule {
    pub fn tier(&self) -> CtrTier {
        CtrTier::from_ctr(self.metrics.ctr)
    }
}

/// Modules ordered by CTR, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRanking {
    pub entries: Vec<RankedModule>,
}

impl ModuleRanking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedModule> {
        self.entries.iter()
    }

    pub fn top(&self, n: usize) -> &[RankedModule] {
        &self.entries[..n.min(self.entries.len())]
    }
}

// ─── Insights ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    LossAnalysis,
    TopModules,
    LowEfficiency,
    Recommendations,
}

/// A titled block of narrative lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub lines: Vec<String>,
}

// ─── Cleaning ───────────────────────────────────────────────────────────────

/// Row counts observed while cleaning a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub original_count: usize,
    pub after_threshold_filter: usize,
    pub after_anomaly_filter: usize,
    /// Missing values per field among the surviving rows; zero counts omitted.
    pub null_field_counts: BTreeMap<String, usize>,
}

impl CleaningStats {
    pub fn removed_by_threshold(&self) -> usize {
        self.original_count - self.after_threshold_filter
    }

    pub fn removed_as_anomalies(&self) -> usize {
        self.after_threshold_filter - self.after_anomaly_filter
    }

    pub fn total_nulls(&self) -> usize {
        self.null_field_counts.values().sum()
    }
}

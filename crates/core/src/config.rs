use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FunnelError, FunnelResult};

/// Root analysis configuration. Loaded from an optional TOML file, then
/// environment variables with the prefix `FUNNEL_INSIGHT__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rows with fewer clicks than this are treated as long-tail noise.
    #[serde(default = "default_min_click_threshold")]
    pub min_click_threshold: u64,
    /// Length of the module ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Number of most recent dates kept in the date trend.
    #[serde(default = "default_trend_days")]
    pub trend_days: usize,
    #[serde(default)]
    pub insights: InsightConfig,
    #[serde(default)]
    pub columns: ColumnMapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Modules listed in the high-value insight.
    #[serde(default = "default_highlight_count")]
    pub highlight_count: usize,
    #[serde(default)]
    pub low_efficiency: LowEfficiencyConfig,
}

/// Flags modules that are seen a lot but rarely clicked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowEfficiencyConfig {
    /// A module qualifies when its CTR is below `ctr_ratio` × overall CTR.
    #[serde(default = "default_ctr_ratio")]
    pub ctr_ratio: f64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub gate: SignificanceGate,
}

/// Minimum exposure a module needs before a low CTR is worth reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignificanceGate {
    /// Exposure strictly above the median exposure across events.
    #[default]
    MedianExposure,
    /// Exposure strictly above a fixed value.
    MinExposure { exposure: u64 },
}

/// Maps each field role to the column name used by the source export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_exposure_column")]
    pub exposure: String,
    #[serde(default = "default_click_column")]
    pub click: String,
    #[serde(default = "default_submit_column")]
    pub submit: String,
    #[serde(default = "default_order_column")]
    pub order: String,
    #[serde(default = "default_event_name_column")]
    pub event_name: String,
    #[serde(default = "default_platform_column")]
    pub platform: Option<String>,
    #[serde(default = "default_date_column")]
    pub date: Option<String>,
}

/// Semantic role of an input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Exposure,
    Click,
    Submit,
    Order,
    EventName,
    Platform,
    Date,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 7] = [
        ColumnRole::Exposure,
        ColumnRole::Click,
        ColumnRole::Submit,
        ColumnRole::Order,
        ColumnRole::EventName,
        ColumnRole::Platform,
        ColumnRole::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Exposure => "exposure",
            ColumnRole::Click => "click",
            ColumnRole::Submit => "submit",
            ColumnRole::Order => "order",
            ColumnRole::EventName => "event_name",
            ColumnRole::Platform => "platform",
            ColumnRole::Date => "date",
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, ColumnRole::Platform | ColumnRole::Date)
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ColumnMapping {
    /// Source column configured for `role`, if any.
    pub fn column_for(&self, role: ColumnRole) -> Option<&str> {
        match role {
            ColumnRole::Exposure => Some(&self.exposure),
            ColumnRole::Click => Some(&self.click),
            ColumnRole::Submit => Some(&self.submit),
            ColumnRole::Order => Some(&self.order),
            ColumnRole::EventName => Some(&self.event_name),
            ColumnRole::Platform => self.platform.as_deref(),
            ColumnRole::Date => self.date.as_deref(),
        }
    }
}

// Default functions
fn default_min_click_threshold() -> u64 {
    10
}
fn default_top_n() -> usize {
    50
}
fn default_trend_days() -> usize {
    15
}
fn default_highlight_count() -> usize {
    5
}
fn default_ctr_ratio() -> f64 {
    0.5
}
fn default_max_entries() -> usize {
    5
}
fn default_exposure_column() -> String {
    "页面UV(SUM)".to_string()
}
fn default_click_column() -> String {
    "点击UV(SUM)".to_string()
}
fn default_submit_column() -> String {
    "点击用户提交单(SUM)".to_string()
}
fn default_order_column() -> String {
    "点击用户预订单(SUM)".to_string()
}
fn default_event_name_column() -> String {
    "点击事件名称".to_string()
}
fn default_platform_column() -> Option<String> {
    Some("平台".to_string())
}
fn default_date_column() -> Option<String> {
    Some("日期".to_string())
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_click_threshold: default_min_click_threshold(),
            top_n: default_top_n(),
            trend_days: default_trend_days(),
            insights: InsightConfig::default(),
            columns: ColumnMapping::default(),
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            highlight_count: default_highlight_count(),
            low_efficiency: LowEfficiencyConfig::default(),
        }
    }
}

impl Default for LowEfficiencyConfig {
    fn default() -> Self {
        Self {
            ctr_ratio: default_ctr_ratio(),
            max_entries: default_max_entries(),
            gate: SignificanceGate::default(),
        }
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            exposure: default_exposure_column(),
            click: default_click_column(),
            submit: default_submit_column(),
            order: default_order_column(),
            event_name: default_event_name_column(),
            platform: default_platform_column(),
            date: default_date_column(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional config file and environment variables.
    /// Environment values win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("FUNNEL_INSIGHT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> FunnelResult<()> {
        if self.top_n == 0 {
            return Err(FunnelError::Config("top_n must be at least 1".into()));
        }
        let ratio = self.insights.low_efficiency.ctr_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(FunnelError::Config(format!(
                "insights.low_efficiency.ctr_ratio must be a positive number, got {ratio}"
            )));
        }
        let mut seen: Vec<(&str, ColumnRole)> = Vec::new();
        for role in ColumnRole::ALL {
            let Some(column) = self.columns.column_for(role) else {
                continue;
            };
            if column.trim().is_empty() {
                return Err(FunnelError::Config(format!(
                    "column name for {role} must not be empty"
                )));
            }
            if let Some((_, other)) = seen.iter().find(|(name, _)| *name == column) {
                return Err(FunnelError::Config(format!(
                    "column '{column}' is mapped to both {other} and {role}"
                )));
            }
            seen.push((column, role));
        }
        Ok(())
    }
}

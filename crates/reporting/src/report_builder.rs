//! Report export: render an [`AnalysisResult`] as Markdown, JSON or CSV.

use std::str::FromStr;

use funnel_core::types::{CtrTier, GroupMetrics, ModuleRanking};
use funnel_core::FunnelResult;
use serde::{Deserialize, Serialize};

use crate::funnel::AnalysisResult;
use crate::insight::thousands;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn render(&self, result: &AnalysisResult) -> FunnelResult<String> {
        match self {
            ExportFormat::Markdown => Ok(to_markdown(result)),
            ExportFormat::Json => to_json(result),
            ExportFormat::Csv => Ok(ranking_to_csv(&result.ranking)),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{other}' (expected markdown, json or csv)")),
        }
    }
}

// ─── Markdown ───────────────────────────────────────────────────────────────

/// Full human-readable report. Sections always appear in the same order:
/// overview, ranking, breakdowns (when present), insights, appendix.
pub fn to_markdown(result: &AnalysisResult) -> String {
    let mut md = String::new();
    let overall = &result.overall;

    md.push_str("# Module Conversion Funnel Report\n\n");
    md.push_str(&format!(
        "**Generated at**: {}\n\n",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("**Data source**: {}\n\n", result.source));
    md.push_str(&format!(
        "**Records analyzed**: {}\n\n",
        thousands(result.records_analyzed() as u64)
    ));
    md.push_str(&format!("**Run ID**: `{}`\n\n---\n\n", result.run_id));

    md.push_str("## 1. Overview\n\n");
    md.push_str("| Metric | Value |\n| :--- | :--- |\n");
    md.push_str(&format!("| **Overall CTR** | **{:.2}%** |\n", overall.ctr));
    md.push_str(&format!("| **Overall click CVR** | **{:.2}%** |\n", overall.click_cvr));
    md.push_str(&format!("| **Overall order CVR** | **{:.2}%** |\n", overall.order_cvr));
    md.push_str(&format!("| Total exposure | {} |\n", thousands(overall.exposure)));
    md.push_str(&format!("| Total clicks | {} |\n", thousands(overall.click)));
    md.push_str(&format!("| Total submissions | {} |\n", thousands(overall.submit)));
    md.push_str(&format!("| Total orders | {} |\n\n", thousands(overall.order)));

    md.push_str(&format!("## 2. Top {} Modules by CTR\n\n", result.config.top_n));
    if result.ranking.is_empty() {
        md.push_str("No modules remained after cleaning.\n\n");
    } else {
        md.push_str("| Rank | Module | Exposure | Clicks | **CTR** | Click CVR | Order CVR |\n");
        md.push_str("| :---: | :--- | ---: | ---: | ---: | ---: | ---: |\n");
        for module in result.ranking.iter() {
            let m = &module.metrics;
            md.push_str(&format!(
                "| {} | {} | {} | {} | **{:.2}%** {} | {:.2}% | {:.2}% |\n",
                module.rank,
                escape_cell(&module.event_name),
                thousands(m.exposure),
                thousands(m.click),
                m.ctr,
                tier_badge(module.tier()),
                m.click_cvr,
                m.order_cvr
            ));
        }
        md.push('\n');
    }

    let mut section = 3;
    if let Some(platforms) = &result.platform_breakdown {
        md.push_str(&format!("## {section}. Platform Breakdown\n\n"));
        group_table(&mut md, "Platform", platforms);
        section += 1;
    }
    if let Some(trend) = &result.date_trend {
        md.push_str(&format!("## {section}. Daily Trend\n\n"));
        group_table(&mut md, "Date", trend);
        section += 1;
    }

    md.push_str(&format!("## {section}. Insights and Recommendations\n\n"));
    for insight in &result.insights {
        md.push_str(&format!("### {}\n\n", insight.title));
        for line in &insight.lines {
            md.push_str(line);
            md.push('\n');
        }
        md.push('\n');
    }
    section += 1;

    md.push_str(&format!("## {section}. Appendix\n\n"));
    md.push_str("### Metric formulas\n\n");
    md.push_str("1. **CTR** = `clicks / exposure × 100%`\n");
    md.push_str("2. **Click CVR** = `submissions / clicks × 100%`\n");
    md.push_str("3. **Order CVR** = `orders / clicks × 100%`\n\n");
    md.push_str("### Cleaning rules\n\n");
    md.push_str(&format!(
        "- Rows with fewer than {} clicks are dropped as long-tail noise ({} removed)\n",
        result.config.min_click_threshold,
        result.cleaning_stats.removed_by_threshold()
    ));
    md.push_str(&format!(
        "- Rows with more clicks than exposures are dropped as anomalies ({} removed)\n",
        result.cleaning_stats.removed_as_anomalies()
    ));
    md.push_str("- All ratios are rounded to 2 decimal places\n");
    if !result.cleaning_stats.null_field_counts.is_empty() {
        md.push_str("\n### Missing values after cleaning\n\n");
        md.push_str(&format!(
            "{} missing values among the retained rows:\n\n",
            result.cleaning_stats.total_nulls()
        ));
        for (field, count) in &result.cleaning_stats.null_field_counts {
            md.push_str(&format!("- `{field}`: {count}\n"));
        }
    }
    md
}

fn group_table(md: &mut String, label: &str, groups: &[GroupMetrics]) {
    md.push_str(&format!(
        "| {label} | Exposure | Clicks | Submissions | Orders | CTR | Click CVR | Order CVR |\n"
    ));
    md.push_str("| :--- | ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for group in groups {
        let m = &group.metrics;
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.2}% | {:.2}% | {:.2}% |\n",
            escape_cell(&group.key),
            thousands(m.exposure),
            thousands(m.click),
            thousands(m.submit),
            thousands(m.order),
            m.ctr,
            m.click_cvr,
            m.order_cvr
        ));
    }
    md.push('\n');
}

fn tier_badge(tier: CtrTier) -> &'static str {
    match tier {
        CtrTier::High => "🟢",
        CtrTier::Medium => "🟡",
        CtrTier::Low => "🔴",
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

// ─── JSON / CSV ─────────────────────────────────────────────────────────────

pub fn to_json(result: &AnalysisResult) -> FunnelResult<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Ranking table as CSV. Module names are always quoted.
pub fn ranking_to_csv(ranking: &ModuleRanking) -> String {
    let mut csv = [
        "rank",
        "event_name",
        "exposure",
        "click",
        "submit",
        "order",
        "ctr",
        "click_cvr",
        "order_cvr",
    ]
    .join(",");
    csv.push('\n');
    for module in ranking.iter() {
        let m = &module.metrics;
        let cells = [
            module.rank.to_string(),
            format!("\"{}\"", module.event_name.replace('"', "\"\"")),
            m.exposure.to_string(),
            m.click.to_string(),
            m.submit.to_string(),
            m.order.to_string(),
            format!("{:.2}", m.ctr),
            format!("{:.2}", m.click_cvr),
            format!("{:.2}", m.order_cvr),
        ];
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv
}

//! Narrative insights: dominant loss stage, standout modules, low-efficiency
//! warnings and stage-specific recommendations.

use funnel_core::config::{InsightConfig, LowEfficiencyConfig, SignificanceGate};
use funnel_core::types::{FunnelMetrics, GroupMetrics, Insight, InsightKind, ModuleRanking};
use serde::{Deserialize, Serialize};

use crate::ranker::sort_by_ctr;

/// A funnel transition where users drop out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossStage {
    ExposureToClick,
    ClickToConversion,
    ConversionToOrder,
}

impl LossStage {
    /// Tie-break order for the dominant stage: earliest entry wins.
    pub const PRIORITY: [LossStage; 3] = [
        LossStage::ExposureToClick,
        LossStage::ClickToConversion,
        LossStage::ConversionToOrder,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LossStage::ExposureToClick => "exposure-to-click",
            LossStage::ClickToConversion => "click-to-conversion",
            LossStage::ConversionToOrder => "conversion-to-order",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            LossStage::ExposureToClick => &[
                "Refine the module's visual design to make it more compelling",
                "Reposition the module to improve exposure quality",
                "A/B test alternative copy and imagery",
                "Make the call-to-action button more visually prominent",
            ],
            LossStage::ClickToConversion => &[
                "Streamline the form page and simplify the flow",
                "Check page load speed",
                "Add trust signals and promotional cues",
                "Improve the form-filling experience",
            ],
            LossStage::ConversionToOrder => &[
                "Streamline checkout to reduce payment friction",
                "Review pricing strategy and coupon usage",
                "Make the order confirmation page more transparent",
                "Offer more payment methods",
            ],
        }
    }
}

impl std::fmt::Display for LossStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Share of users lost at each transition, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub click_loss: f64,
    pub convert_loss: f64,
    pub order_loss: f64,
    pub dominant: LossStage,
}

impl LossBreakdown {
    pub fn from_metrics(overall: &FunnelMetrics) -> Self {
        let click_loss = 100.0 - overall.ctr;
        let convert_loss = 100.0 - overall.click_cvr;
        let order_loss = 100.0 - overall.order_cvr;

        let mut breakdown = Self {
            click_loss,
            convert_loss,
            order_loss,
            dominant: LossStage::ExposureToClick,
        };
        let mut dominant = LossStage::PRIORITY[0];
        for stage in LossStage::PRIORITY {
            if breakdown.loss(stage) > breakdown.loss(dominant) {
                dominant = stage;
            }
        }
        breakdown.dominant = dominant;
        breakdown
    }

    pub fn loss(&self, stage: LossStage) -> f64 {
        match stage {
            LossStage::ExposureToClick => self.click_loss,
            LossStage::ClickToConversion => self.convert_loss,
            LossStage::ConversionToOrder => self.order_loss,
        }
    }

    pub fn dominant_loss(&self) -> f64 {
        self.loss(self.dominant)
    }
}

/// Builds the insight list in display order: loss analysis, high-value
/// modules, low-efficiency warning, recommendations.
///
/// The low-efficiency warning needs the full per-event table and is only
/// emitted when `event_table` is given and some module qualifies.
pub fn generate_insights(
    overall: &FunnelMetrics,
    ranking: &ModuleRanking,
    event_table: Option<&[GroupMetrics]>,
    config: &InsightConfig,
) -> Vec<Insight> {
    let loss = LossBreakdown::from_metrics(overall);
    let mut insights = vec![loss_insight(&loss)];

    insights.push(top_modules_insight(ranking, config.highlight_count));

    if let Some(table) = event_table {
        let flagged = low_efficiency_modules(overall, table, &config.low_efficiency);
        if !flagged.is_empty() {
            insights.push(low_efficiency_insight(&flagged));
        }
    }

    insights.push(recommendation_insight(loss.dominant));
    insights
}

fn loss_insight(loss: &LossBreakdown) -> Insight {
    Insight {
        kind: InsightKind::LossAnalysis,
        title: "Funnel Loss Analysis".into(),
        lines: vec![
            format!(
                "Largest loss stage: **{}**, loss rate {:.2}%",
                loss.dominant,
                loss.dominant_loss()
            ),
            format!(
                "- {}: {:.2}% of users did not click",
                LossStage::ExposureToClick,
                loss.click_loss
            ),
            format!(
                "- {}: {:.2}% of users clicked but did not submit",
                LossStage::ClickToConversion,
                loss.convert_loss
            ),
            format!(
                "- {}: {:.2}% of users submitted but did not complete an order",
                LossStage::ConversionToOrder,
                loss.order_loss
            ),
        ],
    }
}

fn top_modules_insight(ranking: &ModuleRanking, count: usize) -> Insight {
    let mut lines: Vec<String> =
        vec!["These modules have the highest click-through rate and are worth promoting:".into()];
    if ranking.is_empty() {
        lines.push("- No modules remained after cleaning.".into());
    }
    lines.extend(ranking.top(count).iter().map(|m| {
        format!(
            "- **{}**: CTR {:.2}%, order CVR {:.2}%",
            m.event_name, m.metrics.ctr, m.metrics.order_cvr
        )
    }));
    Insight {
        kind: InsightKind::TopModules,
        title: "High-Value Modules".into(),
        lines,
    }
}

/// Modules with CTR below `ctr_ratio` × overall CTR whose exposure clears
/// the significance gate, best CTR first, at most `max_entries`.
pub fn low_efficiency_modules(
    overall: &FunnelMetrics,
    event_table: &[GroupMetrics],
    config: &LowEfficiencyConfig,
) -> Vec<GroupMetrics> {
    let exposure_floor = match config.gate {
        SignificanceGate::MedianExposure => {
            match median(event_table.iter().map(|g| g.metrics.exposure)) {
                Some(median) => median,
                None => return Vec::new(),
            }
        }
        SignificanceGate::MinExposure { exposure } => exposure as f64,
    };
    let ctr_ceiling = overall.ctr * config.ctr_ratio;

    sort_by_ctr(event_table)
        .into_iter()
        .filter(|g| g.metrics.ctr < ctr_ceiling && g.metrics.exposure as f64 > exposure_floor)
        .take(config.max_entries)
        .collect()
}

fn low_efficiency_insight(flagged: &[GroupMetrics]) -> Insight {
    let mut lines: Vec<String> =
        vec!["These modules get heavy exposure but a low click-through rate and need work:".into()];
    lines.extend(flagged.iter().map(|g| {
        format!(
            "- **{}**: CTR {:.2}% (exposure {})",
            g.key,
            g.metrics.ctr,
            thousands(g.metrics.exposure)
        )
    }));
    Insight {
        kind: InsightKind::LowEfficiency,
        title: "Low-Efficiency Warning".into(),
        lines,
    }
}

fn recommendation_insight(stage: LossStage) -> Insight {
    let mut lines = vec![format!("**Addressing the {stage} stage:**")];
    lines.extend(stage.suggestions().iter().map(|s| format!("- {s}")));
    Insight {
        kind: InsightKind::Recommendations,
        title: "Optimization Recommendations".into(),
        lines,
    }
}

/// Median of the values; mean of the two middle values for an even count.
fn median(values: impl Iterator<Item = u64>) -> Option<f64> {
    let mut values: Vec<u64> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] as f64 + values[mid] as f64) / 2.0)
    } else {
        Some(values[mid] as f64)
    }
}

/// Formats a count with comma thousands separators.
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::rank;

    fn overall(ctr: f64, click_cvr: f64, order_cvr: f64) -> FunnelMetrics {
        FunnelMetrics {
            ctr,
            click_cvr,
            order_cvr,
            ..FunnelMetrics::default()
        }
    }

    fn event(key: &str, exposure: u64, ctr: f64) -> GroupMetrics {
        GroupMetrics {
            key: key.into(),
            metrics: FunnelMetrics {
                exposure,
                ctr,
                ..FunnelMetrics::default()
            },
        }
    }

    #[test]
    fn order_stage_dominates_when_order_cvr_is_lowest() {
        let loss = LossBreakdown::from_metrics(&overall(80.0, 50.0, 10.0));
        assert_eq!(loss.click_loss, 20.0);
        assert_eq!(loss.convert_loss, 50.0);
        assert_eq!(loss.order_loss, 90.0);
        assert_eq!(loss.dominant, LossStage::ConversionToOrder);
        assert_eq!(loss.dominant.label(), "conversion-to-order");
    }

    #[test]
    fn ties_go_to_the_earliest_stage() {
        let all_equal = LossBreakdown::from_metrics(&overall(40.0, 40.0, 40.0));
        assert_eq!(all_equal.dominant, LossStage::ExposureToClick);

        let later_tie = LossBreakdown::from_metrics(&overall(90.0, 30.0, 30.0));
        assert_eq!(later_tie.dominant, LossStage::ClickToConversion);
    }

    #[test]
    fn empty_funnel_loses_everything_at_the_first_stage() {
        let loss = LossBreakdown::from_metrics(&FunnelMetrics::default());
        assert_eq!(loss.dominant, LossStage::ExposureToClick);
        assert_eq!(loss.dominant_loss(), 100.0);
    }

    #[test]
    fn insights_come_in_display_order() {
        let events = vec![
            event("hero", 1000, 60.0),
            event("footer", 5000, 2.0),
            event("sidebar", 100, 30.0),
        ];
        let ranking = rank(&events, 50);
        let insights = generate_insights(
            &overall(30.0, 20.0, 5.0),
            &ranking,
            Some(events.as_slice()),
            &InsightConfig::default(),
        );
        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::LossAnalysis,
                InsightKind::TopModules,
                InsightKind::LowEfficiency,
                InsightKind::Recommendations,
            ]
        );
        assert!(insights[0].lines[0].contains("conversion-to-order"));
        assert!(insights[0].lines[0].contains("95.00%"));
        assert_eq!(insights[1].lines[1], "- **hero**: CTR 60.00%, order CVR 0.00%");
        assert_eq!(insights[2].lines[1], "- **footer**: CTR 2.00% (exposure 5,000)");
    }

    #[test]
    fn low_efficiency_is_skipped_without_event_table() {
        let ranking = rank(&[event("a", 10, 1.0)], 50);
        let insights =
            generate_insights(&overall(30.0, 20.0, 5.0), &ranking, None, &InsightConfig::default());
        assert!(insights.iter().all(|i| i.kind != InsightKind::LowEfficiency));
    }

    #[test]
    fn top_modules_kept_for_empty_ranking() {
        let insights = generate_insights(
            &FunnelMetrics::default(),
            &ModuleRanking::default(),
            Some(&[][..]),
            &InsightConfig::default(),
        );
        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::LossAnalysis,
                InsightKind::TopModules,
                InsightKind::Recommendations,
            ]
        );
        assert_eq!(insights[1].lines.len(), 2);
        assert_eq!(insights[1].lines[1], "- No modules remained after cleaning.");
    }

    #[test]
    fn top_modules_lists_at_most_highlight_count() {
        let events: Vec<GroupMetrics> = (0..8).map(|i| event(&format!("m{i}"), 100, i as f64)).collect();
        let ranking = rank(&events, 50);
        let insights =
            generate_insights(&overall(5.0, 5.0, 5.0), &ranking, None, &InsightConfig::default());
        let top = insights.iter().find(|i| i.kind == InsightKind::TopModules).unwrap();
        assert_eq!(top.lines.len(), 1 + 5);
        assert!(top.lines[1].starts_with("- **m7**"));
    }

    #[test]
    fn low_efficiency_requires_both_low_ctr_and_above_median_exposure() {
        let events = vec![
            event("busy-but-weak", 900, 4.0),
            event("quiet-and-weak", 10, 1.0),
            event("busy-and-strong", 800, 40.0),
            event("middle", 300, 25.0),
        ];
        // Median exposure is (300 + 800) / 2 = 550; CTR ceiling is 10.
        let flagged =
            low_efficiency_modules(&overall(20.0, 0.0, 0.0), &events, &LowEfficiencyConfig::default());
        let names: Vec<&str> = flagged.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(names, vec!["busy-but-weak"]);
    }

    #[test]
    fn exposure_equal_to_median_does_not_qualify() {
        let events = vec![event("a", 100, 1.0), event("b", 200, 1.0), event("c", 300, 1.0)];
        let flagged =
            low_efficiency_modules(&overall(50.0, 0.0, 0.0), &events, &LowEfficiencyConfig::default());
        let names: Vec<&str> = flagged.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn low_efficiency_is_capped_and_ordered_by_ctr() {
        let mut events: Vec<GroupMetrics> =
            (0..8).map(|i| event(&format!("weak{i}"), 1000, i as f64 * 0.1)).collect();
        events.extend((0..8).map(|i| event(&format!("small{i}"), 1, 0.0)));
        let flagged =
            low_efficiency_modules(&overall(50.0, 0.0, 0.0), &events, &LowEfficiencyConfig::default());
        assert_eq!(flagged.len(), 5);
        assert_eq!(flagged[0].key, "weak7");
        assert!(flagged.windows(2).all(|w| w[0].metrics.ctr >= w[1].metrics.ctr));
    }

    #[test]
    fn fixed_exposure_gate_replaces_median() {
        let events = vec![event("a", 100, 1.0), event("b", 5000, 1.0), event("c", 6000, 1.0)];
        let config = LowEfficiencyConfig {
            gate: SignificanceGate::MinExposure { exposure: 50 },
            ..LowEfficiencyConfig::default()
        };
        let flagged = low_efficiency_modules(&overall(50.0, 0.0, 0.0), &events, &config);
        assert_eq!(flagged.len(), 3);
    }

    #[test]
    fn recommendations_follow_the_dominant_stage() {
        let insights = generate_insights(
            &overall(10.0, 60.0, 50.0),
            &ModuleRanking::default(),
            None,
            &InsightConfig::default(),
        );
        let recs = insights.last().unwrap();
        assert_eq!(recs.kind, InsightKind::Recommendations);
        assert_eq!(recs.lines[0], "**Addressing the exposure-to-click stage:**");
        assert_eq!(recs.lines.len(), 1 + LossStage::ExposureToClick.suggestions().len());
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(median([3u64, 1, 2].into_iter()), Some(2.0));
        assert_eq!(median([4u64, 1, 3, 2].into_iter()), Some(2.5));
        assert_eq!(median(std::iter::empty()), None);
    }
}

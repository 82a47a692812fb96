//! Funnel metric computation: summed counts and the three stage ratios.

use std::collections::BTreeMap;

use funnel_core::types::{Dataset, FunnelMetrics, GroupKey, GroupMetrics, Record};
use tracing::debug;

/// Sums the four funnel counts and derives CTR, click CVR and order CVR.
///
/// Missing counts sum as zero. Each ratio is 0 when its denominator is 0.
/// Order CVR divides orders by **clicks**, not by submissions.
pub fn compute_metrics<'a, I>(records: I) -> FunnelMetrics
where
    I: IntoIterator<Item = &'a Record>,
{
    let (mut exposure, mut click, mut submit, mut order) = (0u64, 0u64, 0u64, 0u64);
    for record in records {
        exposure += record.exposure.unwrap_or(0);
        click += record.click.unwrap_or(0);
        submit += record.submit.unwrap_or(0);
        order += record.order.unwrap_or(0);
    }

    FunnelMetrics {
        exposure,
        click,
        submit,
        order,
        ctr: percentage(click, exposure),
        click_cvr: percentage(submit, click),
        order_cvr: percentage(order, click),
    }
}

/// Partitions `dataset` by `key` and computes metrics per partition.
///
/// Rows without a value for `key` are skipped. Groups come back in
/// ascending key order; dates are keyed `YYYY-MM-DD` so they sort
/// chronologically.
pub fn compute_grouped_metrics(dataset: &Dataset, key: GroupKey) -> Vec<GroupMetrics> {
    let mut groups: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in dataset.iter() {
        if let Some(value) = group_value(record, key) {
            groups.entry(value).or_default().push(record);
        }
    }
    debug!(key = key.as_str(), groups = groups.len(), "Grouped dataset");

    groups
        .into_iter()
        .map(|(key, records)| GroupMetrics {
            key,
            metrics: compute_metrics(records),
        })
        .collect()
}

fn group_value(record: &Record, key: GroupKey) -> Option<String> {
    match key {
        GroupKey::Event => record.event_name.clone(),
        GroupKey::Platform => record.platform.clone(),
        GroupKey::Date => record.date.map(|d| d.format("%Y-%m-%d").to_string()),
    }
}

/// `numerator / denominator × 100`, rounded to 2 decimals; 0 for a zero denominator.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Rounds to 2 decimals, halves to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn event_scenario_ratios() {
        let records = [Record::new("A", 200, 100, 10, 5)];
        let m = compute_metrics(&records);
        assert_eq!(m.ctr, 50.0);
        assert_eq!(m.click_cvr, 10.0);
        assert_eq!(m.order_cvr, 5.0);
    }

    #[test]
    fn order_cvr_divides_by_clicks_not_submissions() {
        // 8 orders over 40 clicks is 20%; over 16 submissions it would be 50%.
        let records = [Record::new("checkout", 100, 40, 16, 8)];
        let m = compute_metrics(&records);
        assert_eq!(m.order_cvr, 20.0);
        assert_ne!(m.order_cvr, 50.0);
    }

    #[test]
    fn sums_after_threshold_filter_give_expected_ctr() {
        let records = [Record::new("a", 100, 20, 0, 0), Record::new("c", 10, 20, 0, 0)];
        let m = compute_metrics(&records);
        assert_eq!(m.exposure, 110);
        assert_eq!(m.click, 40);
        assert_eq!(m.ctr, 36.36);
    }

    #[test]
    fn zero_denominators_yield_zero_ratios() {
        let m = compute_metrics(&[Record::new("a", 0, 0, 0, 0)]);
        assert_eq!((m.ctr, m.click_cvr, m.order_cvr), (0.0, 0.0, 0.0));

        let m = compute_metrics(&[Record::new("a", 10, 0, 3, 2)]);
        assert_eq!(m.ctr, 0.0);
        assert_eq!(m.click_cvr, 0.0);
        assert_eq!(m.order_cvr, 0.0);

        let m = compute_metrics(std::iter::empty());
        assert_eq!(m, FunnelMetrics::default());
    }

    #[test]
    fn missing_counts_sum_as_zero() {
        let mut record = Record::new("a", 100, 50, 0, 0);
        record.submit = None;
        record.order = None;
        let m = compute_metrics(&[record, Record::new("a", 100, 50, 10, 4)]);
        assert_eq!(m.submit, 10);
        assert_eq!(m.order, 4);
        assert_eq!(m.click_cvr, 10.0);
    }

    #[test]
    fn rounding_happens_once_on_the_final_ratio() {
        let m = compute_metrics(&[Record::new("a", 3, 1, 0, 0), Record::new("b", 3, 1, 0, 0)]);
        assert_eq!(m.ctr, 33.33);
        assert_eq!(percentage(2, 3), 66.67);
    }

    #[test]
    fn exact_halves_round_to_even() {
        assert_eq!(percentage(1, 800), 0.12);
        assert_eq!(percentage(3, 800), 0.38);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.135), 0.14);

        let m = compute_metrics(&[Record::new("a", 8000, 10, 0, 0)]);
        assert_eq!(m.ctr, 0.12);
    }

    #[test]
    fn grouping_sums_per_key_in_key_order() {
        let dataset = Dataset::new(
            "test",
            vec![
                Record::new("search", 100, 30, 3, 1),
                Record::new("banner", 200, 20, 2, 2),
                Record::new("search", 100, 10, 1, 1),
            ],
        );
        let groups = compute_grouped_metrics(&dataset, GroupKey::Event);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "banner");
        assert_eq!(groups[1].key, "search");
        assert_eq!(groups[1].metrics.exposure, 200);
        assert_eq!(groups[1].metrics.click, 40);
        assert_eq!(groups[1].metrics.ctr, 20.0);
    }

    #[test]
    fn rows_without_a_key_are_skipped() {
        let mut unnamed = Record::new("x", 100, 50, 0, 0);
        unnamed.event_name = None;
        let dataset = Dataset::new(
            "test",
            vec![
                unnamed,
                Record::new("a", 10, 5, 0, 0).with_platform("ios"),
            ],
        );
        let by_event = compute_grouped_metrics(&dataset, GroupKey::Event);
        assert_eq!(by_event.len(), 1);
        let by_platform = compute_grouped_metrics(&dataset, GroupKey::Platform);
        assert_eq!(by_platform.len(), 1);
        assert_eq!(by_platform[0].key, "ios");
    }

    #[test]
    fn dates_group_chronologically() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let dataset = Dataset::new(
            "test",
            vec![
                Record::new("a", 10, 5, 0, 0).with_date(day(12)),
                Record::new("a", 10, 5, 0, 0).with_date(day(3)),
                Record::new("b", 10, 1, 0, 0).with_date(day(12)),
            ],
        );
        let groups = compute_grouped_metrics(&dataset, GroupKey::Date);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01-03", "2024-01-12"]);
        assert_eq!(groups[1].metrics.click, 6);
    }
}

use funnel_core::types::{Dataset, FunnelMetrics, GroupMetrics, Record};
use funnel_reporting::{clean, compute_metrics, rank};
use proptest::option;
use proptest::prelude::*;

fn record() -> impl Strategy<Value = Record> {
    (
        option::of(0u64..5_000),
        option::of(0u64..5_000),
        option::of(0u64..1_000),
        option::of(0u64..1_000),
        "[a-e]",
    )
        .prop_map(|(exposure, click, submit, order, name)| Record {
            exposure,
            click,
            submit,
            order,
            event_name: Some(name),
            platform: None,
            date: None,
        })
}

fn dataset() -> impl Strategy<Value = Dataset> {
    prop::collection::vec(record(), 0..60).prop_map(|records| Dataset::new("prop", records))
}

fn group() -> impl Strategy<Value = GroupMetrics> {
    ("[a-z]{1,8}", 0.0f64..100.0).prop_map(|(key, ctr)| GroupMetrics {
        key,
        metrics: FunnelMetrics {
            ctr,
            ..FunnelMetrics::default()
        },
    })
}

proptest! {
    #[test]
    fn cleaned_rows_satisfy_both_rules(data in dataset(), threshold in 0u64..200) {
        let (cleaned, stats) = clean(&data, threshold);
        for r in cleaned.iter() {
            let click = r.click.unwrap_or(0);
            prop_assert!(r.click.is_some() && r.exposure.is_some());
            prop_assert!(click >= threshold);
            prop_assert!(r.exposure.is_some_and(|e| click <= e));
        }
        prop_assert_eq!(stats.after_anomaly_filter, cleaned.len());
        prop_assert!(stats.after_anomaly_filter <= stats.after_threshold_filter);
        prop_assert!(stats.after_threshold_filter <= stats.original_count);
    }

    #[test]
    fn cleaning_twice_changes_nothing(data in dataset(), threshold in 0u64..200) {
        let (once, _) = clean(&data, threshold);
        let (twice, _) = clean(&once, threshold);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn ratios_are_never_negative(data in dataset()) {
        let m = compute_metrics(data.iter());
        prop_assert!(m.ctr >= 0.0);
        prop_assert!(m.click_cvr >= 0.0);
        prop_assert!(m.order_cvr >= 0.0);
        prop_assert!(m.ctr.is_finite() && m.click_cvr.is_finite() && m.order_cvr.is_finite());
    }

    #[test]
    fn cleaned_ctr_never_exceeds_100(data in dataset(), threshold in 0u64..200) {
        let (cleaned, _) = clean(&data, threshold);
        prop_assert!(compute_metrics(cleaned.iter()).ctr <= 100.0);
    }

    #[test]
    fn zero_denominators_give_zero(click in 0u64..100, submit in 0u64..100, order in 0u64..100) {
        let m = compute_metrics(&[Record::new("z", 0, 0, submit, order)]);
        prop_assert_eq!((m.ctr, m.click_cvr, m.order_cvr), (0.0, 0.0, 0.0));

        let m = compute_metrics(&[Record::new("z", 0, click, submit, order)]);
        prop_assert_eq!(m.ctr, 0.0);
    }

    #[test]
    fn ranking_is_sorted_and_bounded(groups in prop::collection::vec(group(), 0..80), top_n in 1usize..60) {
        let ranking = rank(&groups, top_n);
        prop_assert_eq!(ranking.len(), groups.len().min(top_n));
        prop_assert!(ranking.entries.windows(2).all(|w| w[0].metrics.ctr >= w[1].metrics.ctr));
        for (idx, entry) in ranking.iter().enumerate() {
            prop_assert_eq!(entry.rank, idx + 1);
        }
    }
}

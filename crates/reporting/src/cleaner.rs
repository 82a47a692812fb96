//! Row filtering ahead of metric computation.
//!
//! Two rules run in a fixed order:
//! 1. drop rows whose click count is below the configured threshold
//!    (long-tail noise);
//! 2. drop rows with more clicks than exposures (inconsistent data).
//!
//! A missing click or exposure count fails the corresponding rule. Rows are
//! only ever removed, never edited.

use std::collections::BTreeMap;

use funnel_core::types::{CleaningStats, Dataset, Record};
use funnel_core::ColumnRole;
use tracing::{info, warn};

pub fn clean(dataset: &Dataset, min_click_threshold: u64) -> (Dataset, CleaningStats) {
    let original_count = dataset.len();

    let above_threshold: Vec<&Record> = dataset
        .iter()
        .filter(|r| r.click.is_some_and(|click| click >= min_click_threshold))
        .collect();
    let after_threshold_filter = above_threshold.len();
    info!(
        removed = original_count - after_threshold_filter,
        min_click_threshold, "Removed long-tail rows below click threshold"
    );

    let consistent: Vec<Record> = above_threshold
        .into_iter()
        .filter(|r| is_consistent(r))
        .cloned()
        .collect();
    let after_anomaly_filter = consistent.len();
    info!(
        removed = after_threshold_filter - after_anomaly_filter,
        "Removed rows with more clicks than exposures"
    );

    let null_field_counts = null_counts(&consistent, dataset.has_platform, dataset.has_date);
    if null_field_counts.is_empty() {
        info!(rows = after_anomaly_filter, "No missing values after cleaning");
    } else {
        for (field, count) in &null_field_counts {
            warn!(field = %field, count, "Missing values after cleaning");
        }
    }

    let stats = CleaningStats {
        original_count,
        after_threshold_filter,
        after_anomaly_filter,
        null_field_counts,
    };
    (dataset.with_records(consistent), stats)
}

fn is_consistent(record: &Record) -> bool {
    matches!((record.click, record.exposure), (Some(click), Some(exposure)) if click <= exposure)
}

// Optional columns absent from the source are not counted as missing.
fn null_counts(records: &[Record], has_platform: bool, has_date: bool) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let missing = [
            (ColumnRole::Exposure, record.exposure.is_none()),
            (ColumnRole::Click, record.click.is_none()),
            (ColumnRole::Submit, record.submit.is_none()),
            (ColumnRole::Order, record.order.is_none()),
            (ColumnRole::EventName, record.event_name.is_none()),
            (ColumnRole::Platform, has_platform && record.platform.is_none()),
            (ColumnRole::Date, has_date && record.date.is_none()),
        ];
        for (role, is_missing) in missing {
            if is_missing {
                *counts.entry(role.as_str().to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

//! Module ranking by click-through rate.

use funnel_core::types::{GroupMetrics, ModuleRanking, RankedModule};

/// Full per-group table ordered by CTR, best first. The sort is stable, so
/// groups with equal CTR keep their input order.
pub fn sort_by_ctr(grouped: &[GroupMetrics]) -> Vec<GroupMetrics> {
    let mut sorted = grouped.to_vec();
    sorted.sort_by(|a, b| b.metrics.ctr.total_cmp(&a.metrics.ctr));
    sorted
}

/// Top `top_n` groups by CTR with 1-based ranks. Returns every group when
/// there are fewer than `top_n`.
pub fn rank(grouped: &[GroupMetrics], top_n: usize) -> ModuleRanking {
    let entries = sort_by_ctr(grouped)
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(idx, group)| RankedModule {
            rank: idx + 1,
            event_name: group.key,
            metrics: group.metrics,
        })
        .collect();
    ModuleRanking { entries }
}

//! Summaries over scored prediction tables

use crate::types::{RiskLevel, RiskPrediction};
use serde::Serialize;
use std::collections::BTreeMap;

/// Rows per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

pub fn level_counts<T>(rows: &[RiskPrediction<T>]) -> LevelCounts {
    rows.iter().fold(LevelCounts::default(), |mut counts, row| {
        match row.level {
            RiskLevel::Low => counts.low += 1,
            RiskLevel::Medium => counts.medium += 1,
            RiskLevel::High => counts.high += 1,
        }
        counts
    })
}

/// Mean score over all rows, `None` for an empty table
pub fn mean_score<T>(rows: &[RiskPrediction<T>]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    Some(rows.iter().map(|r| r.score).sum::<f64>() / rows.len() as f64)
}

/// Mean score grouped by a key; rows without a key are left out
pub fn mean_score_by<T, K, F>(rows: &[RiskPrediction<T>], key: F) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&T) -> Option<K>,
{
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(&row.record) {
            let entry = sums.entry(k).or_insert((0.0, 0));
            entry.0 += row.score;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

/// Rows bucketed High, in input order
pub fn high_risk<T>(rows: &[RiskPrediction<T>]) -> Vec<&RiskPrediction<T>> {
    rows.iter().filter(|r| r.level == RiskLevel::High).collect()
}

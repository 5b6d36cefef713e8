//! Trust verdicts
//!
//! ランクを人間が読める判定に変換する。
//! 閾値はシードの初期値を基準にする:
//! trust シード並み以上なら trusted、antitrust シード並み以下なら untrusted。

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::RankStoreConfig;
use crate::rank::{HostId, HostRank, RankStore, SeedClass};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankReport {
    pub host: String,
    pub rank: f64,
    pub seed: Option<SeedClass>,
    pub distance_from_seed: u32,
    pub verdict: &'static str,
}

impl RankReport {
    pub fn new(host: &HostId, record: &HostRank, defaults: &RankStoreConfig) -> Self {
        Self {
            host: host.to_string(),
            rank: record.rank,
            seed: record.seed,
            distance_from_seed: record.distance_from_seed,
            verdict: rank_to_verdict(record.rank, defaults),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Most trusted first
    #[default]
    Top,
    /// Least trusted first
    Bottom,
}

/// Format a rank as a human-readable verdict
pub fn rank_to_verdict(rank: f64, defaults: &RankStoreConfig) -> &'static str {
    match rank {
        r if r >= defaults.trust_default => "trusted",
        r if r <= defaults.antitrust_default => "untrusted",
        r if r > defaults.neutral_default => "leaning-trusted",
        r if r < 0.0 => "leaning-untrusted",
        _ => "neutral",
    }
}

/// Reports for the store's hosts, sorted by rank, optionally only one seed class.
pub fn ranked_reports(
    store: &RankStore,
    order: RankOrder,
    seed: Option<SeedClass>,
    limit: usize,
) -> Vec<RankReport> {
    let mut rows: Vec<(&HostId, &HostRank)> = store
        .iter()
        .filter(|(_, r)| seed.is_none() || r.seed == seed)
        .collect();

    rows.sort_by(|a, b| {
        let by_rank = match order {
            RankOrder::Top => b.1.rank.total_cmp(&a.1.rank),
            RankOrder::Bottom => a.1.rank.total_cmp(&b.1.rank),
        };
        match by_rank {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        }
    });

    rows.into_iter()
        .take(limit)
        .map(|(host, record)| RankReport::new(host, record, store.config()))
        .collect()
}

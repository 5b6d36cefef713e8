use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RankStoreConfig;
use crate::error::{RankError, RankResult};
use crate::rank::HostId;

/// Seed classification of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedClass {
    Trust,
    Antitrust,
}

impl SeedClass {
    pub fn name(&self) -> &'static str {
        match self {
            SeedClass::Trust => "trust",
            SeedClass::Antitrust => "antitrust",
        }
    }
}

impl fmt::Display for SeedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeedClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trust" => Ok(SeedClass::Trust),
            "antitrust" => Ok(SeedClass::Antitrust),
            other => Err(format!("unknown seed class '{}'", other)),
        }
    }
}

/// Rank record of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRank {
    /// Positive = trustworthy, negative = untrustworthy. Unbounded.
    pub rank: f64,
    pub seed: Option<SeedClass>,
    /// Believed-minimal hops to the nearest seed. Only ever lowered.
    pub distance_from_seed: u32,
}

impl HostRank {
    pub fn is_seed(&self) -> bool {
        self.seed.is_some()
    }
}

/// Backing map of the store. Owned by whoever persists it between runs.
pub type RankMap = HashMap<HostId, HostRank>;

/// Rank Store - ホストごとのランク状態
///
/// 全ホストのランク・シード種別・シードからの距離を保持する。
/// 初めて参照されたホストはその場でデフォルト値のレコードが作られる。
pub struct RankStore {
    records: RankMap,
    config: RankStoreConfig,
}

impl RankStore {
    pub fn new(config: &RankStoreConfig) -> Self {
        Self::with_records(config, RankMap::new())
    }

    /// Continue from a map captured in an earlier run.
    pub fn with_records(config: &RankStoreConfig, records: RankMap) -> Self {
        Self {
            records,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &RankStoreConfig {
        &self.config
    }

    /// Live backing map, for persistence
    pub fn records(&self) -> &RankMap {
        &self.records
    }

    pub fn into_records(self) -> RankMap {
        self.records
    }

    pub fn get(&self, host: &HostId) -> Option<&HostRank> {
        self.records.get(host)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HostId, &HostRank)> {
        self.records.iter()
    }

    pub fn seed_count(&self) -> usize {
        self.records.values().filter(|r| r.is_seed()).count()
    }

    /// Initial rank for a seed class; `None` gets the neutral default.
    pub fn rank_for_seed(&self, seed: Option<SeedClass>) -> f64 {
        match seed {
            Some(SeedClass::Trust) => self.config.trust_default,
            Some(SeedClass::Antitrust) => self.config.antitrust_default,
            None => self.config.neutral_default,
        }
    }

    /// Recorded seed distance, or the configured fallback when the host is
    /// absent or unknown.
    pub fn distance_of(&self, host: Option<&HostId>) -> u32 {
        host.and_then(|h| self.records.get(h))
            .map(|r| r.distance_from_seed)
            .unwrap_or(self.config.distance_fallback)
    }

    /// Get-or-create the record for `host`.
    ///
    /// - known host + seed: the seed class is (re)assigned and the distance
    ///   drops to 0. Rank is left alone.
    /// - known host, no seed: no change.
    /// - new host + seed: seed default rank, distance 0.
    /// - new host, no seed: neutral rank, referrer's distance + 1.
    pub fn register(
        &mut self,
        host: &HostId,
        seed: Option<SeedClass>,
        referrer: Option<&HostId>,
    ) -> &mut HostRank {
        let fresh_rank = self.rank_for_seed(seed);
        let fresh_distance = match seed {
            Some(_) => 0,
            None => self.distance_of(referrer).saturating_add(1),
        };

        match self.records.entry(host.clone()) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                if let Some(seed) = seed {
                    match record.seed {
                        Some(previous) if previous != seed => {
                            warn!("Seed class of {} changed: {} -> {}", host, previous, seed);
                        }
                        None => info!("🌱 {} promoted to {} seed", host, seed),
                        _ => {}
                    }
                    record.seed = Some(seed);
                    record.distance_from_seed = 0;
                }
                record
            }
            Entry::Vacant(entry) => {
                debug!(
                    "Registered {} (seed: {:?}, rank: {}, distance: {})",
                    host, seed, fresh_rank, fresh_distance
                );
                entry.insert(HostRank {
                    rank: fresh_rank,
                    seed,
                    distance_from_seed: fresh_distance,
                })
            }
        }
    }

    /// Read a rank, registering the host (non-seed, no referrer) if unseen.
    pub fn get_rank(&mut self, host: &HostId) -> f64 {
        self.register(host, None, None).rank
    }

    /// Overwrite a rank. Never creates a record.
    pub fn set_rank(&mut self, host: &HostId, rank: f64) -> RankResult<()> {
        let record = self
            .records
            .get_mut(host)
            .ok_or_else(|| RankError::UnknownHost(host.clone()))?;
        record.rank = rank;
        Ok(())
    }

    /// Read a seed distance, registering the host (non-seed, no referrer) if unseen.
    pub fn get_distance(&mut self, host: &HostId) -> u32 {
        self.register(host, None, None).distance_from_seed
    }

    /// Overwrite a seed distance. Never creates a record.
    pub fn set_distance(&mut self, host: &HostId, distance: u32) -> RankResult<()> {
        let record = self
            .records
            .get_mut(host)
            .ok_or_else(|| RankError::UnknownHost(host.clone()))?;
        record.distance_from_seed = distance;
        Ok(())
    }

    /// Lower `host`'s distance when `referrer` offers a shorter path to a seed.
    ///
    /// An unknown referrer proves nothing and leaves the host untouched.
    /// Returns whether the distance changed.
    pub fn relax_distance(&mut self, host: &HostId, referrer: &HostId) -> RankResult<bool> {
        let Some(via) = self.records.get(referrer).map(|r| r.distance_from_seed) else {
            return Ok(false);
        };
        let candidate = via.saturating_add(1);

        let record = self
            .records
            .get_mut(host)
            .ok_or_else(|| RankError::UnknownHost(host.clone()))?;

        if candidate < record.distance_from_seed {
            debug!(
                "Shorter seed path for {} via {}: {} -> {}",
                host, referrer, record.distance_from_seed, candidate
            );
            record.distance_from_seed = candidate;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

use serde::Serialize;
use tracing::debug;

use crate::config::RankerConfig;
use crate::error::RankResult;
use crate::rank::decay::DistanceDecay;
use crate::rank::host::{distinct_hosts, HostId};
use crate::rank::store::{RankStore, SeedClass};

/// What one ingestion touched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub page: HostId,
    pub seed: Option<SeedClass>,
    /// Distinct linked hosts, first-seen order; also the fan-out
    pub linked: Vec<HostId>,
    /// Outbound links that did not parse to a host
    pub skipped: usize,
}

impl IngestOutcome {
    pub fn fan_out(&self) -> usize {
        self.linked.len()
    }
}

/// Propagation engine: turns crawl results into rank-store updates.
///
/// Single pass, additive, order-dependent. Every in-link adds the referrer's
/// diluted rank plus a distance bonus to the target; nothing is normalized,
/// so repeated endorsements keep accumulating.
pub struct Ranker {
    store: RankStore,
    decay: DistanceDecay,
}

impl Ranker {
    pub fn new(config: &RankerConfig, store: RankStore) -> Self {
        Self {
            store,
            decay: DistanceDecay::new(config),
        }
    }

    pub fn store(&self) -> &RankStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RankStore {
        &mut self.store
    }

    pub fn into_store(self) -> RankStore {
        self.store
    }

    /// Rank `host` as linked from `referrer`, a page with `fan_out` distinct
    /// outbound hosts.
    ///
    ///   new_rank = rank(host) + rank(referrer) / fan_out + decay(distance(host), fan_out)
    ///
    /// `fan_out` counts the referrer's distinct outbound hosts. With a fan-out
    /// of 0 there is nothing to share: the host is registered and keeps its rank.
    pub fn rank_host(
        &mut self,
        host: &HostId,
        seed: Option<SeedClass>,
        referrer: &HostId,
        fan_out: usize,
    ) -> RankResult<f64> {
        self.store.register(host, seed, Some(referrer));
        self.store.relax_distance(host, referrer)?;
        if fan_out == 0 {
            return Ok(self.store.get_rank(host));
        }

        let bonus = self
            .decay
            .contribution(self.store.distance_of(Some(host)), fan_out);
        let forwarded = self.store.get_rank(referrer) / fan_out as f64;
        let new_rank = self.store.get_rank(host) + forwarded + bonus;

        self.store.set_rank(host, new_rank)?;
        Ok(new_rank)
    }

    /// Ingest one crawled page and the links found on it.
    ///
    /// The page is registered with `seed` (this is how a seed page gets its
    /// default rank); its outbound links never carry a seed. Links that fail
    /// to parse are skipped. A malformed page URL is an error and leaves the
    /// store untouched.
    pub fn ingest_crawl_result<I, S>(
        &mut self,
        page_url: &str,
        seed: Option<SeedClass>,
        outbound_links: I,
    ) -> RankResult<IngestOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let page = HostId::from_url(page_url)?;
        let (linked, skipped) = distinct_hosts(outbound_links);

        self.store.register(&page, seed, None);

        let fan_out = linked.len();
        for target in &linked {
            let rank = self.rank_host(target, None, &page, fan_out)?;
            debug!("Ranked {} via {} -> {:.4}", target, page, rank);
        }

        Ok(IngestOutcome {
            page,
            seed,
            linked,
            skipped,
        })
    }
}

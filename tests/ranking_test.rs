use std::collections::HashMap;

use proptest::prelude::*;
use seedrank::config::{RankStoreConfig, RankerConfig};
use seedrank::snapshot::Snapshot;
use seedrank::{HostId, HostRank, RankStore, Ranker, SeedClass};

fn ranker(trust: f64, neutral: f64, steepness: f64, half: f64) -> Ranker {
    let store = RankStore::new(&RankStoreConfig {
        trust_default: trust,
        antitrust_default: -trust,
        neutral_default: neutral,
        distance_fallback: 5,
    });
    Ranker::new(
        &RankerConfig {
            carrying_capacity: 1.0,
            trust_steepness: steepness,
            half_steep_point: half,
        },
        store,
    )
}

fn url(i: usize) -> String {
    format!("https://h{}.example/page", i)
}

fn id(i: usize) -> HostId {
    HostId::from_url(&url(i)).unwrap()
}

#[test]
fn end_to_end_trust_seed_with_two_links() {
    let mut ranker = ranker(10.0, 2.0, 1.0, 1.0);
    ranker
        .ingest_crawl_result("https://a.example", Some(SeedClass::Trust), ["https://b.example", "https://c.example"])
        .unwrap();

    // L = 1, k = 1, x0 = 1, d = 1, fan-out 2
    let decay = (1.0 / (1.0 + 0.0f64.exp())) / 2.0;
    let store = ranker.store();
    let a = store.get(&HostId::new("https://a.example")).unwrap();
    assert_eq!((a.rank, a.distance_from_seed), (10.0, 0));
    for host in ["https://b.example", "https://c.example"] {
        let record = store.get(&HostId::new(host)).unwrap();
        assert!((record.rank - (2.0 + 10.0 / 2.0 + decay)).abs() < 1e-12);
        assert_eq!(record.distance_from_seed, 1);
    }
}

#[test]
fn end_to_end_second_session_continues_from_snapshot() {
    let mut first = ranker(10.0, 2.0, 1.0, 1.0);
    first
        .ingest_crawl_result(&url(0), Some(SeedClass::Trust), [url(1), url(2)])
        .unwrap();
    let json = serde_json::to_string(&Snapshot::capture(first.store().records())).unwrap();

    let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
    let store = RankStore::with_records(first.store().config(), snapshot.into_records());
    let mut second = Ranker::new(
        &RankerConfig { carrying_capacity: 1.0, trust_steepness: 1.0, half_steep_point: 1.0 },
        store,
    );
    second
        .ingest_crawl_result(&url(3), Some(SeedClass::Antitrust), [url(2)])
        .unwrap();

    let h2 = second.store().get(&id(2)).unwrap();
    assert_eq!(h2.distance_from_seed, 1);
    // Trust from session one, then distrust from session two
    let before = first.store().get(&id(2)).unwrap().rank;
    assert!(h2.rank < before);
    assert_eq!(second.store().seed_count(), 2);
}

#[derive(Debug, Clone)]
struct Crawl {
    page: usize,
    seed: Option<SeedClass>,
    links: Vec<usize>,
}

fn arb_seed() -> impl Strategy<Value = Option<SeedClass>> {
    prop_oneof![
        4 => Just(None),
        1 => Just(Some(SeedClass::Trust)),
        1 => Just(Some(SeedClass::Antitrust)),
    ]
}

fn arb_crawl() -> impl Strategy<Value = Crawl> {
    (0usize..8, arb_seed(), prop::collection::vec(0usize..8, 0..6))
        .prop_map(|(page, seed, links)| Crawl { page, seed, links })
}

proptest! {
    #[test]
    fn distances_never_increase(crawls in prop::collection::vec(arb_crawl(), 1..30)) {
        let mut ranker = ranker(1.0, 0.25, 6.0, 2.0);
        let mut previous: HashMap<HostId, HostRank> = HashMap::new();

        for crawl in &crawls {
            let links: Vec<String> = crawl.links.iter().map(|&i| url(i)).collect();
            ranker.ingest_crawl_result(&url(crawl.page), crawl.seed, &links).unwrap();

            for (host, before) in &previous {
                let now = ranker.store().get(host).unwrap();
                prop_assert!(now.distance_from_seed <= before.distance_from_seed);
            }
            previous = ranker.store().records().clone();
        }
    }

    #[test]
    fn seeds_sit_at_distance_zero(crawls in prop::collection::vec(arb_crawl(), 1..30)) {
        let mut ranker = ranker(1.0, 0.25, 6.0, 2.0);
        for crawl in &crawls {
            let links: Vec<String> = crawl.links.iter().map(|&i| url(i)).collect();
            ranker.ingest_crawl_result(&url(crawl.page), crawl.seed, &links).unwrap();
        }

        for (_, record) in ranker.store().iter() {
            if record.is_seed() {
                prop_assert_eq!(record.distance_from_seed, 0);
            } else {
                prop_assert!(record.distance_from_seed >= 1);
            }
        }
    }

    #[test]
    fn seed_class_survives_seedless_ingestion(
        crawls in prop::collection::vec(arb_crawl(), 0..20),
        seed_host in 0usize..8,
    ) {
        let mut ranker = ranker(1.0, 0.25, 6.0, 2.0);
        ranker.ingest_crawl_result(&url(seed_host), Some(SeedClass::Trust), Vec::<String>::new()).unwrap();

        for crawl in &crawls {
            let links: Vec<String> = crawl.links.iter().map(|&i| url(i)).collect();
            ranker.ingest_crawl_result(&url(crawl.page), None, &links).unwrap();
        }

        prop_assert_eq!(ranker.store().get(&id(seed_host)).unwrap().seed, Some(SeedClass::Trust));
    }

    #[test]
    fn linkless_pages_touch_only_themselves(
        crawls in prop::collection::vec(arb_crawl(), 1..15),
        lonely in 8usize..12,
    ) {
        let mut ranker = ranker(1.0, 0.25, 6.0, 2.0);
        for crawl in &crawls {
            let links: Vec<String> = crawl.links.iter().map(|&i| url(i)).collect();
            ranker.ingest_crawl_result(&url(crawl.page), crawl.seed, &links).unwrap();
        }
        let before = ranker.store().records().clone();

        ranker.ingest_crawl_result(&url(lonely), None, Vec::<String>::new()).unwrap();

        let after = ranker.store().records();
        prop_assert_eq!(after.len(), before.len() + 1);
        for (host, record) in &before {
            prop_assert_eq!(after.get(host), Some(record));
        }
    }

    #[test]
    fn snapshot_round_trip_is_exact(crawls in prop::collection::vec(arb_crawl(), 1..20)) {
        let mut ranker = ranker(1.0, 0.25, 6.0, 2.0);
        for crawl in &crawls {
            let links: Vec<String> = crawl.links.iter().map(|&i| url(i)).collect();
            ranker.ingest_crawl_result(&url(crawl.page), crawl.seed, &links).unwrap();
        }

        let json = serde_json::to_string(&Snapshot::capture(ranker.store().records())).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        let mut store = RankStore::with_records(ranker.store().config(), restored.into_records());

        for (host, record) in ranker.store().iter() {
            prop_assert_eq!(store.get(host).map(|r| r.seed), Some(record.seed));
            prop_assert_eq!(store.get_rank(host), record.rank);
            prop_assert_eq!(store.get_distance(host), record.distance_from_seed);
        }
    }
}

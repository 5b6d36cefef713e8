//! seedrank - シードから広がる信頼スコア
//!
//! Trust/distrust ranking for crawled websites. Seed sites are marked
//! `trust` or `antitrust`; every crawl result pushes a share of the crawled
//! page's rank onto the hosts it links to, plus a bonus that fades with the
//! distance from the nearest seed.

pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod metrics;
pub mod rank;
pub mod session;
pub mod snapshot;
pub mod trust;
pub mod web;

pub use config::Config;
pub use engine::RankEngine;
pub use error::{RankError, RankResult};
pub use rank::{HostId, HostRank, IngestOutcome, RankMap, RankStore, Ranker, SeedClass};
pub use session::{CrawlEvent, CrawlResult, SessionManager};

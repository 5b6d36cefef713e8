pub mod decay;
pub mod host;
pub mod propagation;
pub mod store;

pub use decay::DistanceDecay;
pub use host::{distinct_hosts, HostId};
pub use propagation::{IngestOutcome, Ranker};
pub use store::{HostRank, RankMap, RankStore, SeedClass};

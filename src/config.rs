use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub rank_store: RankStoreConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankerConfig {
    /// Ceiling of the distance-decay logistic
    #[serde(default = "default_carrying_capacity")]
    pub carrying_capacity: f64,
    /// Logistic steepness, expected > 0
    #[serde(default = "default_trust_steepness")]
    pub trust_steepness: f64,
    /// Distance (in hops) at which the decay bonus is half its ceiling
    #[serde(default = "default_half_steep_point")]
    pub half_steep_point: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankStoreConfig {
    #[serde(default = "default_trust_default")]
    pub trust_default: f64,
    #[serde(default = "default_antitrust_default")]
    pub antitrust_default: f64,
    #[serde(default = "default_neutral_default")]
    pub neutral_default: f64,
    /// Assumed seed distance of a referrer we have never seen
    #[serde(default = "default_distance_fallback")]
    pub distance_fallback: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Crawled pages per session before it is closed
    #[serde(default = "default_crawl_limit")]
    pub crawl_limit: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub path: String,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Max journal entries before rotation
    #[serde(default = "default_journal_max")]
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_web_address")]
    pub address: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human format
    #[serde(default)]
    pub json: bool,
    /// EnvFilter directive used when RUST_LOG is unset
    pub filter: Option<String>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            carrying_capacity: default_carrying_capacity(),
            trust_steepness: default_trust_steepness(),
            half_steep_point: default_half_steep_point(),
        }
    }
}

impl Default for RankStoreConfig {
    fn default() -> Self {
        Self {
            trust_default: default_trust_default(),
            antitrust_default: default_antitrust_default(),
            neutral_default: default_neutral_default(),
            distance_fallback: default_distance_fallback(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { crawl_limit: default_crawl_limit() }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_snapshot_path(),
            flush_interval_secs: default_flush_interval(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_journal_max(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_web_address(),
            port: default_web_port(),
        }
    }
}

// Default value functions
fn default_carrying_capacity() -> f64 { 10.0 }
fn default_trust_steepness() -> f64 { 6.0 }
fn default_half_steep_point() -> f64 { 2.0 }
fn default_trust_default() -> f64 { 1.0 }
fn default_antitrust_default() -> f64 { -1.0 }
fn default_neutral_default() -> f64 { 0.25 }
fn default_distance_fallback() -> u32 { 5 }
fn default_crawl_limit() -> u32 { 5 }
fn default_true() -> bool { true }
fn default_snapshot_path() -> String { "rank_cache.json".to_string() }
fn default_flush_interval() -> u64 { 60 }
fn default_journal_max() -> usize { 10_000 }
fn default_web_address() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8090 }

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        let config = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config '{}': {}", path, e))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Log settings that parse fine but are probably mistakes
    pub fn warn_suspicious(&self) {
        if self.ranker.trust_steepness <= 0.0 {
            warn!(
                "trust_steepness = {} makes the decay bonus grow with distance",
                self.ranker.trust_steepness
            );
        }
        if self.sessions.crawl_limit == 0 {
            warn!("sessions.crawl_limit = 0: every session closes on its first page");
        }
    }
}

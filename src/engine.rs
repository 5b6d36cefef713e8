use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::journal::Journal;
use crate::metrics::RankMetrics;
use crate::rank::{RankMap, RankStore, Ranker, SeedClass};
use crate::session::{CrawlEvent, CrawlResult, SessionManager};
use crate::snapshot::{self, Snapshot};

/// One recorded crawl session, one per line of a replay file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySession {
    pub seed_url: String,
    #[serde(default)]
    pub seed_kind: Option<SeedClass>,
    pub crawl_limit: Option<u32>,
    #[serde(default)]
    pub results: Vec<CrawlResult>,
}

/// Core rank engine - ties the session manager, journal, metrics and
/// snapshot persistence together
pub struct RankEngine {
    pub config: Arc<Config>,
    sessions: Arc<SessionManager>,
    journal: Arc<Journal>,
    metrics: Arc<RankMetrics>,
}

impl RankEngine {
    /// Build the engine on top of `records`, the map carried over from an
    /// earlier run (empty for a fresh start).
    pub fn new(config: Arc<Config>, records: RankMap) -> Self {
        let store = RankStore::with_records(&config.rank_store, records);
        let ranker = Ranker::new(&config.ranker, store);
        let journal = Arc::new(Journal::new(&config.journal));
        let metrics = Arc::new(RankMetrics::new());
        let sessions = Arc::new(SessionManager::new(
            &config.sessions,
            ranker,
            journal.clone(),
            metrics.clone(),
        ));

        Self {
            config,
            sessions,
            journal,
            metrics,
        }
    }

    /// Load the configured snapshot (if any) and build the engine on it.
    pub fn restore(config: Arc<Config>) -> anyhow::Result<Self> {
        let records = if config.snapshot.enabled {
            snapshot::load(Path::new(&config.snapshot.path))?
                .map(Snapshot::into_records)
                .unwrap_or_default()
        } else {
            RankMap::new()
        };
        Ok(Self::new(config, records))
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    pub fn metrics(&self) -> &Arc<RankMetrics> {
        &self.metrics
    }

    /// (hosts, seed hosts) currently in the store
    pub fn store_counts(&self) -> (usize, usize) {
        let ranker = self.sessions.ranker();
        let ranker = ranker.lock();
        (ranker.store().len(), ranker.store().seed_count())
    }

    /// Copy of the live rank map
    pub fn export_records(&self) -> RankMap {
        let ranker = self.sessions.ranker();
        let ranker = ranker.lock();
        ranker.store().records().clone()
    }

    /// Write the snapshot file now. No-op when snapshots are disabled.
    pub fn save_snapshot(&self) -> anyhow::Result<usize> {
        if !self.config.snapshot.enabled {
            return Ok(0);
        }

        // Capture under the lock, write without it
        let snapshot = {
            let ranker = self.sessions.ranker();
            let ranker = ranker.lock();
            Snapshot::capture(ranker.store().records())
        };
        let hosts = snapshot.hosts.len();

        match snapshot::save(Path::new(&self.config.snapshot.path), &snapshot) {
            Ok(()) => {
                self.metrics.snapshot_saves_total.fetch_add(1, Ordering::Relaxed);
                Ok(hosts)
            }
            Err(e) => {
                self.metrics.snapshot_failures_total.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// `save_snapshot` on the blocking pool, for async callers
    pub async fn flush_snapshot(self: &Arc<Self>) -> anyhow::Result<usize> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.save_snapshot()).await?
    }

    /// Snapshot flush loop - periodically persist the rank map
    pub async fn run_snapshot_loop(self: Arc<Self>) {
        if !self.config.snapshot.enabled || self.config.snapshot.flush_interval_secs == 0 {
            return;
        }

        let interval = std::time::Duration::from_secs(self.config.snapshot.flush_interval_secs);
        info!("Snapshot flush started (interval: {:?})", interval);

        loop {
            tokio::time::sleep(interval).await;
            match self.flush_snapshot().await {
                Ok(hosts) => debug!("Snapshot flushed ({} hosts)", hosts),
                Err(e) => error!("Snapshot flush failed: {}", e),
            }
        }
    }

    /// Replay recorded crawl sessions (JSON lines) through the session
    /// manager, one session at a time. Returns the number of sessions replayed.
    pub fn replay(&self, path: &Path) -> anyhow::Result<usize> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open replay file '{}': {}", path.display(), e))?;
        let reader = std::io::BufReader::new(file);

        let mut replayed = 0;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let session: ReplaySession = serde_json::from_str(&line).map_err(|e| {
                anyhow::anyhow!("Bad replay line {} in '{}': {}", line_no + 1, path.display(), e)
            })?;
            self.replay_session(session)?;
            replayed += 1;
        }

        info!("Replayed {} sessions from {}", replayed, path.display());
        Ok(replayed)
    }

    fn replay_session(&self, replay: ReplaySession) -> anyhow::Result<()> {
        let id = self
            .sessions
            .open(&replay.seed_url, replay.seed_kind, replay.crawl_limit)?;

        for result in replay.results {
            let page = result.page_url.clone();
            match self.sessions.handle_event(id, CrawlEvent::Crawled(result)) {
                Ok(ack) if ack.stop => break,
                Ok(_) => {}
                Err(e) => warn!("Session {}: skipping {}: {}", id, page, e),
            }
        }

        self.sessions.handle_event(id, CrawlEvent::Done)?;
        Ok(())
    }

    /// Get stats for the web API
    pub fn get_stats(&self) -> serde_json::Value {
        let (hosts, seeds) = self.store_counts();
        let sessions = self.sessions.list();
        serde_json::json!({
            "store": {
                "hosts": hosts,
                "seed_hosts": seeds,
            },
            "sessions": {
                "total": sessions.len(),
                "active": self.sessions.active_count(),
            },
            "ingests": self.metrics.ingests_total.load(Ordering::Relaxed),
            "journal": self.journal.get_stats(),
            "snapshot": {
                "enabled": self.config.snapshot.enabled,
                "path": self.config.snapshot.path,
                "saves": self.metrics.snapshot_saves_total.load(Ordering::Relaxed),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::HostId;

    fn config_in(dir: &Path) -> Arc<Config> {
        let mut config = Config::default();
        config.snapshot.path = dir.join("ranks.json").to_string_lossy().into_owned();
        Arc::new(config)
    }

    #[test]
    fn test_replay_then_restore_continues_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let replay_path = dir.path().join("crawl.jsonl");
        std::fs::write(
            &replay_path,
            concat!(
                r#"{"seedUrl": "https://good.example", "seedKind": "trust", "crawlLimit": 2, "results": ["#,
                r#"{"pageUrl": "https://good.example/", "textLinks": ["https://mid.example/a"]},"#,
                r#"{"pageUrl": "https://mid.example/a", "lonelyLinks": ["https://far.example"]},"#,
                r#"{"pageUrl": "https://far.example/", "textLinks": ["https://beyond.example"]}"#,
                "]}\n",
                "\n",
                r#"{"seedUrl": "https://bad.example", "seedKind": "antitrust", "results": ["#,
                r#"{"pageUrl": "https://bad.example/", "textLinks": ["https://mid.example"]}"#,
                "]}\n",
            ),
        )
        .unwrap();

        let engine = RankEngine::new(config.clone(), RankMap::new());
        assert_eq!(engine.replay(&replay_path).unwrap(), 2);

        let records = engine.export_records();
        // crawl limit 2 stopped the first session before far.example was crawled
        assert!(!records.contains_key(&HostId::new("https://beyond.example")));
        assert_eq!(records[&HostId::new("https://far.example")].distance_from_seed, 2);
        assert_eq!(records[&HostId::new("https://mid.example")].distance_from_seed, 1);
        assert_eq!(records[&HostId::new("https://bad.example")].seed, Some(SeedClass::Antitrust));

        assert_eq!(engine.save_snapshot().unwrap(), records.len());
        let restored = RankEngine::restore(config).unwrap();
        assert_eq!(restored.export_records(), records);
        assert_eq!(restored.store_counts(), (records.len(), 2));
    }

    #[test]
    fn test_replay_rejects_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.jsonl");
        std::fs::write(&path, "{\"seedUrl\": 5}\n").unwrap();
        let engine = RankEngine::new(config_in(dir.path()), RankMap::new());
        assert!(engine.replay(&path).is_err());
    }

    #[test]
    fn test_disabled_snapshot_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.snapshot.enabled = false;
        config.snapshot.path = dir.path().join("never.json").to_string_lossy().into_owned();
        let engine = RankEngine::new(Arc::new(config), RankMap::new());
        assert_eq!(engine.save_snapshot().unwrap(), 0);
        assert!(!dir.path().join("never.json").exists());
    }

    #[tokio::test]
    async fn test_flush_snapshot_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(RankEngine::new(config_in(dir.path()), RankMap::new()));
        let id = engine
            .sessions()
            .open("https://good.example", Some(SeedClass::Trust), None)
            .unwrap();
        engine
            .sessions()
            .handle_event(
                id,
                CrawlEvent::Crawled(CrawlResult {
                    page_url: "https://good.example/".to_string(),
                    lonely_links: Vec::new(),
                    text_links: vec!["https://next.example".to_string()],
                }),
            )
            .unwrap();

        assert_eq!(engine.flush_snapshot().await.unwrap(), 2);
        let saved = snapshot::load(&dir.path().join("ranks.json")).unwrap().unwrap();
        assert_eq!(saved.into_records(), engine.export_records());
        assert_eq!(engine.metrics().snapshot_saves_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stats_shape() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RankEngine::new(config_in(dir.path()), RankMap::new());
        let stats = engine.get_stats();
        assert_eq!(stats["store"]["hosts"], 0);
        assert_eq!(stats["sessions"]["active"], 0);
        assert_eq!(stats["journal"]["enabled"], true);
    }
}

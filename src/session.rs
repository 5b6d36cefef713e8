use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{RankError, RankResult};
use crate::journal::Journal;
use crate::metrics::RankMetrics;
use crate::rank::{HostId, IngestOutcome, Ranker, SeedClass};

/// A crawled page as reported by the external crawler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub page_url: String,
    /// Links found outside of any text (bare hrefs, resources)
    #[serde(default)]
    pub lonely_links: Vec<String>,
    /// Links found in anchor text
    #[serde(default)]
    pub text_links: Vec<String>,
}

impl CrawlResult {
    pub fn outbound_links(&self) -> impl Iterator<Item = &str> {
        self.lonely_links
            .iter()
            .chain(self.text_links.iter())
            .map(String::as_str)
    }
}

/// Events a crawler emits for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CrawlEvent {
    Crawled(CrawlResult),
    Failed { reason: String },
    Error { reason: String },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    /// Crawled its page limit; the crawler should be stopped
    LimitReached,
    /// The crawler reported it has nothing left
    Done,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: u64,
    pub seed_url: String,
    pub seed_kind: Option<SeedClass>,
    pub crawl_limit: u32,
    pub crawled: u32,
    pub failures: u32,
    pub errors: u32,
    pub status: SessionStatus,
    pub opened_at: DateTime<Utc>,
}

/// Reply to one crawl event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAck {
    pub session: u64,
    pub crawled: u32,
    pub status: SessionStatus,
    /// The crawler should stop this session now
    pub stop: bool,
    pub outcome: Option<IngestOutcome>,
}

/// Crawl Sessions - クロールジョブごとの進行管理
///
/// 1セッション = 1シードURLからのクロール。
/// 最初のクロール結果だけにシード種別を付け、上限ページ数で打ち切る。
/// 複数セッションが同時に走っても、ランカーへの書き込みは1つのロックで直列化される。
pub struct SessionManager {
    ranker: Arc<Mutex<Ranker>>,
    sessions: DashMap<u64, SessionInfo>,
    next_id: AtomicU64,
    config: SessionConfig,
    journal: Arc<Journal>,
    metrics: Arc<RankMetrics>,
}

impl SessionManager {
    pub fn new(
        config: &SessionConfig,
        ranker: Ranker,
        journal: Arc<Journal>,
        metrics: Arc<RankMetrics>,
    ) -> Self {
        Self {
            ranker: Arc::new(Mutex::new(ranker)),
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            config: config.clone(),
            journal,
            metrics,
        }
    }

    /// Shared ranker. Hold the lock for the whole read-modify-write.
    pub fn ranker(&self) -> Arc<Mutex<Ranker>> {
        self.ranker.clone()
    }

    /// Open a session for one seed URL. `crawl_limit` falls back to the
    /// configured default.
    pub fn open(
        &self,
        seed_url: &str,
        seed_kind: Option<SeedClass>,
        crawl_limit: Option<u32>,
    ) -> RankResult<u64> {
        HostId::from_url(seed_url)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let crawl_limit = crawl_limit.unwrap_or(self.config.crawl_limit);
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                seed_url: seed_url.to_string(),
                seed_kind,
                crawl_limit,
                crawled: 0,
                failures: 0,
                errors: 0,
                status: SessionStatus::Active,
                opened_at: Utc::now(),
            },
        );
        self.metrics.sessions_opened_total.fetch_add(1, Ordering::Relaxed);

        info!(
            "🕸️ Session {} opened: {} (seed: {}, limit: {})",
            id,
            seed_url,
            seed_kind.map(|s| s.name()).unwrap_or("none"),
            crawl_limit
        );
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// All sessions, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut all: Vec<SessionInfo> = self.sessions.iter().map(|s| s.clone()).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    /// Handle one event from the crawler running session `id`.
    pub fn handle_event(&self, id: u64, event: CrawlEvent) -> RankResult<EventAck> {
        match event {
            CrawlEvent::Crawled(result) => self.handle_crawled(id, &result),
            CrawlEvent::Failed { reason } => {
                let info = self.update(id, |s| s.failures += 1)?;
                self.metrics.crawl_failures_total.fetch_add(1, Ordering::Relaxed);
                error!("Session {} crawling failed: {}", id, reason);
                Ok(Self::ack(&info, None))
            }
            CrawlEvent::Error { reason } => {
                let info = self.update(id, |s| s.errors += 1)?;
                self.metrics.crawl_errors_total.fetch_add(1, Ordering::Relaxed);
                warn!("Session {} crawling error: {}", id, reason);
                Ok(Self::ack(&info, None))
            }
            CrawlEvent::Done => {
                let mut closed_now = false;
                let info = self.update(id, |s| {
                    if s.status == SessionStatus::Active {
                        s.status = SessionStatus::Done;
                        closed_now = true;
                    }
                })?;
                if closed_now {
                    self.metrics.sessions_closed_total.fetch_add(1, Ordering::Relaxed);
                }
                info!("Session {} crawler has finished ({} pages)", id, info.crawled);
                Ok(Self::ack(&info, None))
            }
        }
    }

    fn handle_crawled(&self, id: u64, result: &CrawlResult) -> RankResult<EventAck> {
        if let Err(e) = HostId::from_url(&result.page_url) {
            self.metrics.ingest_rejects_total.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        // The session entry stays held across ingestion so results are ranked
        // in the order they were counted. Lock order: session entry, then ranker.
        let (info, outcome) = {
            let mut session = self.sessions.get_mut(&id).ok_or(RankError::UnknownSession(id))?;
            if session.status != SessionStatus::Active {
                self.metrics.ingest_rejects_total.fetch_add(1, Ordering::Relaxed);
                return Err(RankError::SessionClosed(id));
            }

            // Only the first result stems from the seed URL itself
            let seed = if session.crawled == 0 { session.seed_kind } else { None };
            let outcome = {
                let mut ranker = self.ranker.lock();
                ranker.ingest_crawl_result(&result.page_url, seed, result.outbound_links())?
            };

            session.crawled += 1;
            if session.crawled >= session.crawl_limit {
                session.status = SessionStatus::LimitReached;
                self.metrics.sessions_closed_total.fetch_add(1, Ordering::Relaxed);
                info!("Session {} reached its crawl limit ({})", id, session.crawl_limit);
            }
            (session.clone(), outcome)
        };

        debug!(
            "Session {} ingested {} ({} linked hosts, {} skipped)",
            id,
            outcome.page,
            outcome.fan_out(),
            outcome.skipped
        );
        self.journal.record_ingest(Some(id), &outcome);
        self.metrics.record_ingest(&outcome);

        Ok(Self::ack(&info, Some(outcome)))
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut SessionInfo)) -> RankResult<SessionInfo> {
        let mut session = self.sessions.get_mut(&id).ok_or(RankError::UnknownSession(id))?;
        f(&mut *session);
        Ok(session.clone())
    }

    fn ack(info: &SessionInfo, outcome: Option<IngestOutcome>) -> EventAck {
        EventAck {
            session: info.id,
            crawled: info.crawled,
            status: info.status,
            stop: info.status != SessionStatus::Active,
            outcome,
        }
    }
}

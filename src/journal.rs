use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;

use crate::config::JournalConfig;
use crate::rank::IngestOutcome;

/// Ingest Journal - 取り込んだクロール結果をWAL的に記録
///
/// 「このホストのランクはどのページから来た？」が引ける。
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub timestamp: String,
    pub session: Option<u64>,
    pub page: String,
    pub seed: Option<String>,
    pub fan_out: usize,
    pub skipped_links: usize,
    pub linked: Vec<String>,
}

pub struct Journal {
    config: JournalConfig,
    entries: RwLock<Vec<JournalEntry>>,
    total_recorded: AtomicU64,
}

impl Journal {
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            config: config.clone(),
            entries: RwLock::new(Vec::new()),
            total_recorded: AtomicU64::new(0),
        }
    }

    /// Record an ingestion in the journal
    pub fn record_ingest(&self, session: Option<u64>, outcome: &IngestOutcome) {
        if !self.config.enabled {
            return;
        }

        let entry = JournalEntry {
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            session,
            page: outcome.page.to_string(),
            seed: outcome.seed.map(|s| s.name().to_string()),
            fan_out: outcome.fan_out(),
            skipped_links: outcome.skipped,
            linked: outcome.linked.iter().map(|h| h.to_string()).collect(),
        };

        let mut entries = self.entries.write();
        entries.push(entry);
        self.total_recorded.fetch_add(1, Ordering::Relaxed);

        // Rotation: keep within max_entries
        if entries.len() > self.config.max_entries {
            let drain_count = entries.len() - self.config.max_entries;
            entries.drain(..drain_count);
        }
    }

    /// Search by host, matching the crawled page or any linked host.
    /// Most recent first.
    pub fn search(&self, host: Option<&str>, limit: usize) -> Vec<JournalEntry> {
        let entries = self.entries.read();
        entries
            .iter()
            .rev()
            .filter(|e| match host {
                Some(h) => e.page.contains(h) || e.linked.iter().any(|l| l.contains(h)),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> serde_json::Value {
        let entries = self.entries.read();
        serde_json::json!({
            "enabled": self.config.enabled,
            "current_entries": entries.len(),
            "max_entries": self.config.max_entries,
            "total_recorded": self.total_recorded.load(Ordering::Relaxed),
        })
    }
}

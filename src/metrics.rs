//! Prometheus-compatible metrics exporter for seedrank
//!
//! Endpoint: GET /metrics (on the web API port, default 8090)

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::engine::RankEngine;
use crate::rank::IngestOutcome;

/// Counters updated from ingestion and session handling
pub struct RankMetrics {
    /// Crawl results ingested
    pub ingests_total: AtomicU64,
    /// Ingestions that carried a seed class
    pub seed_ingests_total: AtomicU64,
    /// Linked hosts ranked (one per distinct outbound host)
    pub links_ranked_total: AtomicU64,
    /// Outbound links skipped as malformed
    pub links_skipped_total: AtomicU64,
    /// Crawl results rejected (bad page URL, closed session)
    pub ingest_rejects_total: AtomicU64,
    pub crawl_failures_total: AtomicU64,
    pub crawl_errors_total: AtomicU64,
    pub sessions_opened_total: AtomicU64,
    pub sessions_closed_total: AtomicU64,
    pub snapshot_saves_total: AtomicU64,
    pub snapshot_failures_total: AtomicU64,
    /// Server start time
    pub start_time: Instant,
}

impl RankMetrics {
    pub fn new() -> Self {
        Self {
            ingests_total: AtomicU64::new(0),
            seed_ingests_total: AtomicU64::new(0),
            links_ranked_total: AtomicU64::new(0),
            links_skipped_total: AtomicU64::new(0),
            ingest_rejects_total: AtomicU64::new(0),
            crawl_failures_total: AtomicU64::new(0),
            crawl_errors_total: AtomicU64::new(0),
            sessions_opened_total: AtomicU64::new(0),
            sessions_closed_total: AtomicU64::new(0),
            snapshot_saves_total: AtomicU64::new(0),
            snapshot_failures_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_ingest(&self, outcome: &IngestOutcome) {
        self.ingests_total.fetch_add(1, Ordering::Relaxed);
        if outcome.seed.is_some() {
            self.seed_ingests_total.fetch_add(1, Ordering::Relaxed);
        }
        self.links_ranked_total
            .fetch_add(outcome.fan_out() as u64, Ordering::Relaxed);
        self.links_skipped_total
            .fetch_add(outcome.skipped as u64, Ordering::Relaxed);
    }
}

impl Default for RankMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate Prometheus-format metrics text
pub fn render_metrics(engine: &RankEngine) -> String {
    let mut out = String::with_capacity(4096);
    let c = engine.metrics();

    // ──────────────────────────────────────────────
    // Server info
    // ──────────────────────────────────────────────
    write_help_type(&mut out, "seedrank_up", "Whether the ranking service is up.", "gauge");
    writeln!(out, "seedrank_up 1").ok();

    let uptime = c.start_time.elapsed().as_secs_f64();
    write_help_type(&mut out, "seedrank_time_up_seconds_total", "Uptime since service start in seconds.", "counter");
    writeln!(out, "seedrank_time_up_seconds_total {:.3}", uptime).ok();

    // ──────────────────────────────────────────────
    // Rank store
    // ──────────────────────────────────────────────
    let (hosts, seeds) = engine.store_counts();
    write_help_type(&mut out, "seedrank_hosts", "Hosts with a rank record.", "gauge");
    writeln!(out, "seedrank_hosts {}", hosts).ok();

    write_help_type(&mut out, "seedrank_seed_hosts", "Hosts classified as seeds.", "gauge");
    writeln!(out, "seedrank_seed_hosts {}", seeds).ok();

    // ──────────────────────────────────────────────
    // Ingestion
    // ──────────────────────────────────────────────
    write_help_type(&mut out, "seedrank_ingests_total", "Crawl results ingested, by seed tagging.", "counter");
    let ingests = c.ingests_total.load(Ordering::Relaxed);
    let seeded = c.seed_ingests_total.load(Ordering::Relaxed);
    writeln!(out, "seedrank_ingests_total{{seeded=\"true\"}} {}", seeded).ok();
    writeln!(out, "seedrank_ingests_total{{seeded=\"false\"}} {}", ingests.saturating_sub(seeded)).ok();

    write_counter(&mut out, "seedrank_links_ranked_total", "Distinct linked hosts ranked.", c.links_ranked_total.load(Ordering::Relaxed));
    write_counter(&mut out, "seedrank_links_skipped_total", "Outbound links skipped as malformed.", c.links_skipped_total.load(Ordering::Relaxed));
    write_counter(&mut out, "seedrank_ingest_rejects_total", "Crawl results rejected.", c.ingest_rejects_total.load(Ordering::Relaxed));

    // ──────────────────────────────────────────────
    // Crawl sessions
    // ──────────────────────────────────────────────
    write_help_type(&mut out, "seedrank_crawl_events_total", "Non-result crawl events, by kind.", "counter");
    writeln!(out, "seedrank_crawl_events_total{{kind=\"failed\"}} {}", c.crawl_failures_total.load(Ordering::Relaxed)).ok();
    writeln!(out, "seedrank_crawl_events_total{{kind=\"error\"}} {}", c.crawl_errors_total.load(Ordering::Relaxed)).ok();

    write_counter(&mut out, "seedrank_sessions_opened_total", "Crawl sessions opened.", c.sessions_opened_total.load(Ordering::Relaxed));
    write_counter(&mut out, "seedrank_sessions_closed_total", "Crawl sessions closed by limit or done.", c.sessions_closed_total.load(Ordering::Relaxed));

    write_help_type(&mut out, "seedrank_sessions_active", "Crawl sessions still accepting results.", "gauge");
    writeln!(out, "seedrank_sessions_active {}", engine.sessions().active_count()).ok();

    // ──────────────────────────────────────────────
    // Snapshot
    // ──────────────────────────────────────────────
    write_help_type(&mut out, "seedrank_snapshot_saves_total", "Snapshot writes, by result.", "counter");
    writeln!(out, "seedrank_snapshot_saves_total{{result=\"ok\"}} {}", c.snapshot_saves_total.load(Ordering::Relaxed)).ok();
    writeln!(out, "seedrank_snapshot_saves_total{{result=\"error\"}} {}", c.snapshot_failures_total.load(Ordering::Relaxed)).ok();

    out
}

fn write_help_type(out: &mut String, name: &str, help: &str, metric_type: &str) {
    writeln!(out, "# HELP {} {}", name, help).ok();
    writeln!(out, "# TYPE {} {}", name, metric_type).ok();
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    write_help_type(out, name, help, "counter");
    writeln!(out, "{} {}", name, value).ok();
}

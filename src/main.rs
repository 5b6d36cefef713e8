use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use seedrank::config::{Config, LoggingConfig};
use seedrank::engine::RankEngine;
use seedrank::web::WebServer;

const DEFAULT_CONFIG_PATH: &str = "seedrank.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Usage: seedrank [config.toml] [replay.jsonl]
    let mut args = std::env::args().skip(1);
    let config_arg = args.next();
    let replay_path = args.next();

    let config_path = config_arg.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = if config_arg.is_none() && !Path::new(&config_path).exists() {
        None
    } else {
        Some(Config::load(&config_path)?)
    };
    let loaded_from_file = config.is_some();
    let config = config.unwrap_or_default();

    init_tracing(&config.logging);

    info!("🌱 seedrank v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded_from_file {
        info!("Config loaded from {}", config_path);
    } else {
        warn!("{} not found, running with defaults", config_path);
    }
    config.warn_suspicious();

    let config = Arc::new(config);
    let engine = Arc::new(RankEngine::restore(config.clone())?);
    let (hosts, seeds) = engine.store_counts();
    info!("Rank store ready: {} hosts ({} seeds)", hosts, seeds);

    // Offline mode: replay recorded sessions, persist, exit
    if let Some(replay_path) = replay_path {
        engine.replay(Path::new(&replay_path))?;
        let saved = engine.save_snapshot()?;
        info!("Replay finished, {} hosts saved", saved);
        return Ok(());
    }

    // Start snapshot flush loop
    let snapshot_engine = engine.clone();
    tokio::spawn(async move {
        snapshot_engine.run_snapshot_loop().await;
    });

    // Start Web API
    let web_engine = engine.clone();
    let web_config = config.clone();
    tokio::spawn(async move {
        let web = WebServer::new(web_engine, web_config);
        if let Err(e) = web.run().await {
            error!("Web server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, flushing snapshot...");
    match engine.flush_snapshot().await {
        Ok(hosts) => info!("Snapshot saved ({} hosts)", hosts),
        Err(e) => error!("Final snapshot failed: {}", e),
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .filter
            .clone()
            .unwrap_or_else(|| "seedrank=info".to_string())
            .into()
    });

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

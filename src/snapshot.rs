use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rank::{HostId, HostRank, RankMap};

/// Rank snapshot - セッションをまたいでランクを持ち越すためのファイル
///
/// Hosts are kept sorted so two snapshots of the same store diff cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub hosts: BTreeMap<HostId, HostRank>,
}

impl Snapshot {
    pub fn capture(records: &RankMap) -> Self {
        Self {
            saved_at: Utc::now(),
            hosts: records.iter().map(|(h, r)| (h.clone(), r.clone())).collect(),
        }
    }

    pub fn into_records(self) -> RankMap {
        self.hosts.into_iter().collect()
    }
}

/// Load a snapshot. A missing file is not an error: there is nothing to
/// continue from yet.
pub fn load(path: &Path) -> anyhow::Result<Option<Snapshot>> {
    if !path.exists() {
        debug!("No snapshot at {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read snapshot '{}': {}", path.display(), e))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse snapshot '{}': {}", path.display(), e))?;

    info!(
        "Snapshot loaded from {} ({} hosts, saved {})",
        path.display(),
        snapshot.hosts.len(),
        snapshot.saved_at
    );
    Ok(Some(snapshot))
}

/// Write a snapshot next to `path` and rename it into place, so a crash
/// mid-write never leaves a truncated file behind.
pub fn save(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let write = |tmp: &Path| -> std::io::Result<()> {
        let mut file = std::fs::File::create(tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()
    };
    write(&tmp)
        .map_err(|e| anyhow::anyhow!("Failed to write snapshot '{}': {}", tmp.display(), e))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| anyhow::anyhow!("Failed to move snapshot into '{}': {}", path.display(), e))?;

    debug!("Snapshot saved to {} ({} hosts)", path.display(), snapshot.hosts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankStoreConfig;
    use crate::rank::{RankStore, SeedClass};

    fn sample_store() -> RankStore {
        let mut store = RankStore::new(&RankStoreConfig::default());
        let seed = HostId::new("https://seed.example");
        let child = HostId::new("https://child.example");
        store.register(&seed, Some(SeedClass::Antitrust), None);
        store.register(&child, None, Some(&seed));
        store.set_rank(&child, -3.25).unwrap();
        store
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_restores_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.json");
        let store = sample_store();

        save(&path, &Snapshot::capture(store.records())).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        let mut restored = RankStore::with_records(store.config(), loaded.into_records());

        assert_eq!(restored.len(), store.len());
        for (host, record) in store.iter() {
            assert_eq!(restored.get(host), Some(record));
            assert_eq!(restored.get_rank(host), record.rank);
            assert_eq!(restored.get_distance(host), record.distance_from_seed);
        }
        assert!(!dir.path().join("ranks.json.tmp").exists());
    }

    #[test]
    fn test_wire_format() {
        let snapshot = Snapshot::capture(sample_store().records());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json["hosts"]["https://seed.example"],
            serde_json::json!({"rank": -1.0, "seed": "antitrust", "distanceFromSeed": 0})
        );
        assert_eq!(json["hosts"]["https://child.example"]["seed"], serde_json::Value::Null);
        assert!(json["savedAt"].is_string());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_err());
    }
}

//! Group cache: in-memory snapshot of the account's groups, mirrored to a
//! JSON file so the dashboard has data before the first live refresh.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use wagate_core::{error::GatewayError, group::GroupSummary, traits::Session};

#[derive(Clone)]
pub struct GroupCache {
    groups: Arc<RwLock<Vec<GroupSummary>>>,
    /// Held from the in-memory swap through the file rename, so the file
    /// always matches the last snapshot installed.
    writer: Arc<Mutex<()>>,
    path: PathBuf,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl GroupCache {
    /// Pre-populate from the snapshot file at `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or malformed file
    /// is logged and also yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let groups = match read_snapshot(&path) {
            Ok(Some(groups)) => {
                info!(
                    "loaded {} cached groups from {}",
                    groups.len(),
                    path.display()
                );
                groups
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("ignoring group snapshot {}: {e}", path.display());
                Vec::new()
            }
        };

        Self {
            groups: Arc::new(RwLock::new(groups)),
            writer: Arc::new(Mutex::new(())),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot. Never touches the network or disk.
    pub async fn list(&self) -> Vec<GroupSummary> {
        self.groups.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.groups.read().await.len()
    }

    pub async fn find(&self, id: &str) -> Option<GroupSummary> {
        let id = wagate_core::jid::group_jid(id);
        self.groups.read().await.iter().find(|g| g.id == id).cloned()
    }

    /// Rebuild the snapshot from the live session and persist it.
    ///
    /// Enumeration failure leaves the previous snapshot in place. A failed
    /// write is logged; the new in-memory snapshot is kept.
    pub async fn refresh(&self, session: &dyn Session) -> Result<Vec<GroupSummary>, GatewayError> {
        let records = session.participating_groups().await?;

        let mut seen = HashSet::with_capacity(records.len());
        let mut groups = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id.clone()) {
                warn!("duplicate group id {} in enumeration, keeping first", record.id);
                continue;
            }
            groups.push(GroupSummary::from(record));
        }

        let _writer = self.writer.lock().await;
        *self.groups.write().await = groups.clone();

        if let Err(e) = self.persist(&groups).await {
            warn!("failed to write group snapshot {}: {e}", self.path.display());
        }

        info!("group cache refreshed: {} groups", groups.len());
        Ok(groups)
    }

    async fn persist(&self, groups: &[GroupSummary]) -> Result<(), GatewayError> {
        let json = serde_json::to_string_pretty(groups)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GatewayError::Persistence(e.to_string()))?;
        }

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .path
            .with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| GatewayError::Persistence(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(GatewayError::Persistence(e.to_string()));
        }
        Ok(())
    }
}

/// Read a snapshot file. `Ok(None)` when the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<Vec<GroupSummary>>, GatewayError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GatewayError::Persistence(e.to_string())),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| GatewayError::Persistence(format!("malformed snapshot: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, MockSession};

    fn team_and_family() -> MockSession {
        MockSession::with_groups(vec![
            record("A@g.us", Some("Team"), Some(5)),
            record("B@g.us", Some("Family"), Some(3)),
        ])
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(tmp.path().join("groups.json"));
        assert!(cache.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("groups.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = GroupCache::load(&path);
        assert!(cache.list().await.is_empty());
        assert!(read_snapshot(&path).is_err());
    }

    #[tokio::test]
    async fn test_refresh_round_trips_through_snapshot_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("groups.json");
        let cache = GroupCache::load(&path);

        let groups = cache.refresh(&team_and_family()).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(cache.list().await, groups);

        let on_disk = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(on_disk, groups);
        assert_eq!(on_disk[0].name, "Team");
        assert_eq!(on_disk[0].participants, 5);
        assert_eq!(on_disk[1].id, "B@g.us");

        // A fresh process sees the same snapshot before any live refresh.
        let reloaded = GroupCache::load(&path);
        assert_eq!(reloaded.list().await, groups);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(tmp.path().join("groups.json"));
        cache.refresh(&team_and_family()).await.unwrap();

        let only_c = MockSession::with_groups(vec![record("C@g.us", None, None)]);
        let groups = cache.refresh(&only_c).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Unknown Group");
        assert_eq!(groups[0].participants, 0);
        assert_eq!(cache.count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_enumeration_keeps_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(tmp.path().join("groups.json"));
        cache.refresh(&team_and_family()).await.unwrap();

        let err = cache.refresh(&MockSession::failing()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Collaborator(_)));
        assert_eq!(cache.count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(tmp.path().join("groups.json"));
        let session = MockSession::with_groups(vec![
            record("A@g.us", Some("First"), Some(1)),
            record("A@g.us", Some("Second"), Some(2)),
        ]);
        let groups = cache.refresh(&session).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "First");
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_still_refreshes() {
        let tmp = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so the write fails.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let cache = GroupCache::load(blocker.join("groups.json"));

        let groups = cache.refresh(&team_and_family()).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(cache.count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_refreshes_leave_file_matching_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("groups.json");
        let cache = GroupCache::load(&path);

        let small = Arc::new(MockSession::with_groups(vec![record(
            "A@g.us",
            Some("Team"),
            Some(1),
        )]));
        let large = Arc::new(MockSession::with_groups(
            (0..200)
                .map(|i| record(&format!("{i}@g.us"), Some("Bulk"), Some(2)))
                .collect(),
        ));

        for _ in 0..100 {
            let (a, b) = (cache.clone(), cache.clone());
            let (s1, s2) = (small.clone(), large.clone());
            let first = tokio::spawn(async move { a.refresh(s1.as_ref()).await });
            let second = tokio::spawn(async move { b.refresh(s2.as_ref()).await });
            first.await.unwrap().unwrap();
            second.await.unwrap().unwrap();

            let on_disk = read_snapshot(&path).unwrap().unwrap();
            assert_eq!(on_disk, cache.list().await);
        }

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind");
    }

    #[tokio::test]
    async fn test_find_normalizes_id() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(tmp.path().join("groups.json"));
        cache.refresh(&team_and_family()).await.unwrap();
        assert_eq!(cache.find("A").await.unwrap().name, "Team");
        assert!(cache.find("Z@g.us").await.is_none());
    }
}

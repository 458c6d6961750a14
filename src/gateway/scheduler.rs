//! Deferred group refreshes after connect and group change events.

use super::state::SessionState;
use crate::groups::GroupCache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What caused a refresh to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    /// The session just opened.
    Connected,
    /// Group membership or metadata changed.
    GroupsChanged,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::GroupsChanged => "groups-changed",
        })
    }
}

/// Schedules a group refresh some time after a trigger.
pub trait RefreshScheduler: Send + Sync {
    fn schedule(&self, trigger: RefreshTrigger);
}

/// Spawns one delayed refresh task per trigger. Overlapping triggers are not
/// coalesced; each arms its own timer.
pub struct DelayedRefresh {
    cache: GroupCache,
    session: Arc<SessionState>,
    delay: Duration,
}

impl DelayedRefresh {
    pub fn new(cache: GroupCache, session: Arc<SessionState>, delay: Duration) -> Self {
        Self {
            cache,
            session,
            delay,
        }
    }
}

impl RefreshScheduler for DelayedRefresh {
    fn schedule(&self, trigger: RefreshTrigger) {
        let delay = self.delay;
        let cache = self.cache.clone();
        let state = self.session.clone();
        debug!("group refresh ({trigger}) scheduled in {}ms", delay.as_millis());

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let session = match state.live_session().await {
                Ok(s) => s,
                Err(_) => {
                    debug!("skipping group refresh ({trigger}): not connected");
                    return;
                }
            };
            if let Err(e) = cache.refresh(session.as_ref()).await {
                warn!("group refresh ({trigger}) failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, MockSession};
    use wagate_core::session::ConnectionState;

    async fn live_state(session: MockSession) -> Arc<SessionState> {
        let state = Arc::new(SessionState::default());
        state.set_session(Arc::new(session)).await;
        state.set_connection(ConnectionState::Connected).await;
        state
    }

    #[tokio::test]
    async fn test_refresh_runs_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(dir.path().join("groups.json"));
        let state = live_state(MockSession::with_groups(vec![record(
            "A@g.us",
            Some("Team"),
            Some(2),
        )]))
        .await;

        let scheduler = DelayedRefresh::new(cache.clone(), state, Duration::from_millis(50));
        scheduler.schedule(RefreshTrigger::Connected);
        assert_eq!(cache.count().await, 0, "refresh waits for the delay");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.count().await, 1);
        assert!(dir.path().join("groups.json").exists());
    }

    #[tokio::test]
    async fn test_refresh_skipped_when_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GroupCache::load(dir.path().join("groups.json"));
        let state = Arc::new(SessionState::default());
        state
            .set_session(Arc::new(MockSession::with_groups(vec![record(
                "A@g.us", None, None,
            )])))
            .await;

        let scheduler = DelayedRefresh::new(cache.clone(), state, Duration::ZERO);
        scheduler.schedule(RefreshTrigger::GroupsChanged);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.count().await, 0);
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(RefreshTrigger::Connected.to_string(), "connected");
        assert_eq!(RefreshTrigger::GroupsChanged.to_string(), "groups-changed");
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, RwLock};

use super::state::{Action, DashboardState, Notice, RequestTicket, Slice};

const NOTICE_JOURNAL_CAPACITY: usize = 64;

/// Shared handle to the dashboard state. Every mutation goes through
/// [`DashboardStore::dispatch`] or [`DashboardStore::issue`]; the write lock is
/// never held across an await point.
///
/// Notices expire from the state after the TTL, but each one is also sent once
/// on a broadcast journal so a subscriber sees it regardless of timing.
#[derive(Clone)]
pub(crate) struct DashboardStore {
    state: Arc<RwLock<DashboardState>>,
    revision: Arc<watch::Sender<u64>>,
    notices: broadcast::Sender<Notice>,
    notice_ttl: Duration,
}

impl DashboardStore {
    pub(crate) fn new(notice_ttl: Duration) -> Self {
        let (revision, _) = watch::channel(0);
        let (notices, _) = broadcast::channel(NOTICE_JOURNAL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(DashboardState::default())),
            revision: Arc::new(revision),
            notices,
            notice_ttl,
        }
    }

    pub(crate) async fn dispatch(&self, action: Action) -> bool {
        let name = action.name();
        let records_notice = matches!(action, Action::Notify { .. });
        let (applied, view, notice) = {
            let mut state = self.state.write().await;
            let applied = state.apply(action, Instant::now(), self.notice_ttl);
            let notice = if applied && records_notice { state.notices.last().cloned() } else { None };
            (applied, state.view, notice)
        };

        if let Some(notice) = notice {
            // No subscribers is the normal case outside the CLI.
            let _ = self.notices.send(notice);
        }

        if applied {
            self.revision.send_modify(|revision| *revision += 1);
            tracing::debug!(action = name, view = view.as_str(), "Dashboard action applied");
        } else {
            tracing::debug!(action = name, "Dropped stale dashboard response");
        }

        applied
    }

    pub(crate) async fn issue(&self, slice: Slice) -> RequestTicket {
        self.state.write().await.issue(slice)
    }

    pub(crate) async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub(crate) fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}

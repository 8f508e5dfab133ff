//! Single-flight token refresh.
//!
//! At most one refresh runs at a time. The first request to see a 401
//! becomes the leader and gets a [`RefreshLease`]; every request that
//! arrives while the lease is held becomes a follower and waits on a
//! oneshot channel. Settling the lease answers all followers in arrival
//! order and returns the coordinator to idle. A lease dropped without
//! being settled rejects its followers, so no waiter is ever stranded.

use desk_core::SessionEnd;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome delivered to a waiting request: the new access token, or why
/// the session ended.
pub type RefreshOutcome = Result<String, SessionEnd>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Result of asking to refresh.
pub enum RefreshTicket {
    /// Caller must perform the refresh and settle the lease.
    Leader(RefreshLease),
    /// A refresh is already running; await its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::Idle)),
        }
    }

    /// Become the leader if idle, otherwise join the queue.
    pub fn acquire(&self) -> RefreshTicket {
        let mut state = self.state.lock();
        match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    waiters: VecDeque::new(),
                };
                RefreshTicket::Leader(RefreshLease {
                    state: self.state.clone(),
                    settled: false,
                })
            }
            RefreshState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                debug!(queued = waiters.len(), "Request queued behind token refresh");
                RefreshTicket::Follower(rx)
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of requests waiting on the current refresh.
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }
}

/// Held by the refresh leader until the outcome is published.
pub struct RefreshLease {
    state: Arc<Mutex<RefreshState>>,
    settled: bool,
}

impl RefreshLease {
    /// Publish the new access token. Returns how many waiters were released.
    pub fn resolve(mut self, access_token: String) -> usize {
        self.settle(Ok(access_token))
    }

    /// Publish a failure. Returns how many waiters were rejected.
    pub fn reject(mut self, reason: SessionEnd) -> usize {
        self.settle(Err(reason))
    }

    fn settle(&mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => VecDeque::new(),
            }
        };
        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means the caller gave up; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Err(SessionEnd::RefreshAbandoned));
        }
    }
}

//! Inactivity timeout.
//!
//! The watchdog is fed user activity and periodic ticks. While an access
//! token is held it keeps `last_activity` current (throttled) and, once the
//! idle budget is spent, ends the session exactly once for that token.

use parking_lot::Mutex;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::config::SessionPolicy;
use crate::hooks::{LoginRedirect, Navigator, Notice, Notifier, RedirectReason};
use crate::store::SessionStore;

pub const NOTICE_SESSION_TIMEOUT: &str = "Your session has timed out, please log in again";

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Click,
    KeyDown,
    MouseMove,
    TouchStart,
    Wheel,
    Focus,
    /// Visibility changed; only becoming visible counts.
    Visibility { visible: bool },
}

impl ActivityKind {
    fn counts(&self) -> bool {
        !matches!(self, Self::Visibility { visible: false })
    }
}

/// What a single evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleVerdict {
    /// No access token held; nothing is watched.
    Unarmed,
    /// The event did not count as activity.
    Ignored,
    /// `last_activity` was missing and has been set.
    Seeded,
    /// Activity recorded.
    Recorded,
    /// Within the throttle window; not written.
    Throttled,
    /// Within budget, nothing to do.
    Active { remaining_ms: i64 },
    /// Budget exceeded: session ended by this call.
    TimedOut,
    /// Budget exceeded but the timeout already fired for this token.
    AlreadyFired,
}

#[derive(Default)]
struct WatchState {
    /// Access token the timeout fired for.
    fired_for: Option<String>,
    current_path: String,
}

pub struct IdleWatchdog {
    store: SessionStore,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    policy: SessionPolicy,
    state: Mutex<WatchState>,
}

impl IdleWatchdog {
    pub fn new(
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            navigator,
            policy,
            state: Mutex::new(WatchState {
                fired_for: None,
                current_path: "/".to_string(),
            }),
        }
    }

    /// Track where the user is, so a timeout can send them back.
    pub fn set_location(&self, path: impl Into<String>) {
        self.state.lock().current_path = path.into();
    }

    pub fn location(&self) -> String {
        self.state.lock().current_path.clone()
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Handle one user interaction.
    pub fn record_activity(&self, kind: ActivityKind) -> IdleVerdict {
        if !kind.counts() {
            return IdleVerdict::Ignored;
        }
        self.evaluate(true)
    }

    /// Periodic tick.
    pub fn check(&self) -> IdleVerdict {
        self.evaluate(false)
    }

    fn evaluate(&self, is_activity: bool) -> IdleVerdict {
        let mut state = self.state.lock();
        let session = self.store.snapshot();

        let Some(token) = session.access_token else {
            state.fired_for = None;
            return IdleVerdict::Unarmed;
        };
        if state.fired_for.as_deref() == Some(token.as_str()) {
            return IdleVerdict::AlreadyFired;
        }

        let now = self.store.now_ms();
        let Some(last) = session.last_activity else {
            self.store.update_activity(Some(now));
            return IdleVerdict::Seeded;
        };

        let idle_for = now - last;
        if idle_for >= self.policy.idle_timeout_ms() {
            state.fired_for = Some(token);
            let from = state.current_path.clone();
            self.store.clear_tokens();
            self.store.set_initializing(false);
            drop(state);

            metrics().idle_timeouts.inc();
            warn!(idle_ms = idle_for, from = %from, "Session timed out after inactivity");
            self.notifier.notify(Notice::warning(NOTICE_SESSION_TIMEOUT));
            self.navigator.redirect(
                LoginRedirect::to(self.policy.login_path.clone())
                    .from_path(from)
                    .because(RedirectReason::Timeout),
            );
            return IdleVerdict::TimedOut;
        }

        if !is_activity {
            return IdleVerdict::Active {
                remaining_ms: self.policy.idle_timeout_ms() - idle_for,
            };
        }
        if idle_for >= self.policy.activity_throttle_ms() {
            self.store.update_activity(Some(now));
            debug!(idle_ms = idle_for, "Activity recorded");
            IdleVerdict::Recorded
        } else {
            IdleVerdict::Throttled
        }
    }
}

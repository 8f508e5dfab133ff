//! Periodic background work for a signed-in desk.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use client::{IdleVerdict, IdleWatchdog, ProfileService};
use desk_core::{limits, NotificationQuery};
use telemetry::{log_snapshot, metrics};

use crate::feed::NotificationFeed;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle timeout check interval
    pub idle_check_interval: Duration,
    /// Unread badge poll interval
    pub unread_poll_interval: Duration,
    /// Notification list poll interval
    pub notifications_poll_interval: Duration,
    /// How often the metrics snapshot is logged; `None` disables it
    pub metrics_log_interval: Option<Duration>,
    /// Page of notifications kept fresh by the poller
    pub notification_query: NotificationQuery,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_check_interval: limits::IDLE_CHECK_INTERVAL,
            unread_poll_interval: limits::UNREAD_COUNT_POLL_INTERVAL,
            notifications_poll_interval: limits::NOTIFICATIONS_POLL_INTERVAL,
            metrics_log_interval: Some(Duration::from_secs(300)),
            notification_query: NotificationQuery {
                skip: Some(0),
                limit: Some(20),
                unread_only: None,
            },
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    watchdog: Arc<IdleWatchdog>,
    profile: ProfileService,
    feed: Arc<NotificationFeed>,
}

/// Running workers. Dropping the handle stops them.
pub struct SchedulerHandle {
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every worker and wait for them to wind down.
    pub async fn shutdown(mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("Background workers stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        watchdog: Arc<IdleWatchdog>,
        profile: ProfileService,
        feed: Arc<NotificationFeed>,
    ) -> Self {
        Self {
            config,
            watchdog,
            profile,
            feed,
        }
    }

    pub fn feed(&self) -> &Arc<NotificationFeed> {
        &self.feed
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_idle_check().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_unread_poller().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_notifications_poller().await;
        }));

        if let Some(every) = self.config.metrics_log_interval {
            handles.push(tokio::spawn(async move {
                let mut ticker = interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    log_snapshot();
                }
            }));
        }

        info!(workers = handles.len(), "Background workers started");
        SchedulerHandle { handles }
    }

    async fn run_idle_check(&self) {
        let mut ticker = interval(self.config.idle_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.watchdog.check() {
                IdleVerdict::TimedOut => {
                    self.feed.reset();
                    info!("Idle check ended the session");
                }
                verdict => debug!(?verdict, "Idle check"),
            }
        }
    }

    async fn run_unread_poller(&self) {
        let mut ticker = interval(self.config.unread_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_unread().await;
        }
    }

    async fn run_notifications_poller(&self) {
        let mut ticker = interval(self.config.notifications_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_notifications().await;
        }
    }

    /// One unread-count poll. Skipped while signed out.
    pub async fn poll_unread(&self) {
        if !self.profile.client().store().is_authenticated() {
            return;
        }
        metrics().polls.inc();
        match self.profile.reload_unread_count().await {
            Ok(count) => {
                metrics().unread_notifications.set(count);
                self.feed.publish_unread(count);
            }
            Err(e) => {
                metrics().poll_errors.inc();
                warn!(error = %e, "Unread count poll failed");
            }
        }
    }

    /// One notification-list poll. Skipped while signed out.
    pub async fn poll_notifications(&self) {
        if !self.profile.client().store().is_authenticated() {
            return;
        }
        metrics().polls.inc();
        match self
            .profile
            .reload_notifications(&self.config.notification_query)
            .await
        {
            Ok(list) => {
                metrics().unread_notifications.set(list.unread_count);
                self.feed.publish_notifications(list);
            }
            Err(e) => {
                metrics().poll_errors.inc();
                warn!(error = %e, "Notification poll failed");
            }
        }
    }
}

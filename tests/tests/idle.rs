//! Tests for the inactivity timeout.
//!
//! These tests drive the idle watchdog with a manual clock and check that a
//! session idle past the budget is ended once, with a single notice and a
//! single redirect carrying the page the user was on.

use client::idle::NOTICE_SESSION_TIMEOUT;
use client::{ActivityKind, IdleVerdict, Method, NoticeLevel, RedirectReason};
use integration_tests::fixtures;
use integration_tests::setup::TestContext;
use std::sync::Arc;
use std::time::Duration;
use worker::{NotificationFeed, WorkerConfig, WorkerScheduler};

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn test_idle_session_is_ended_with_notice_and_redirect() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.desk.watchdog.set_location("/approvals");

    ctx.clock.advance(16 * MINUTE);
    assert_eq!(ctx.desk.watchdog.check(), IdleVerdict::TimedOut);

    let store = &ctx.desk.store;
    assert!(!store.is_authenticated());
    assert!(store.refresh_token().is_none());
    assert!(store.last_activity().is_none());
    assert!(!store.is_initializing());
    assert!(ctx.storage.stored().is_none());

    let notices = ctx.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices[0].message, NOTICE_SESSION_TIMEOUT);

    let redirects = ctx.navigator.redirects();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].to, "/login");
    assert_eq!(redirects[0].from.as_deref(), Some("/approvals"));
    assert_eq!(redirects[0].reason, Some(RedirectReason::Timeout));
    assert_eq!(redirects[0].location(), "/login?reason=timeout");
}

#[test]
fn test_session_within_budget_stays() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());

    ctx.clock.advance(14 * MINUTE);
    assert!(matches!(
        ctx.desk.watchdog.check(),
        IdleVerdict::Active { remaining_ms } if remaining_ms == 60_000
    ));
    assert!(ctx.desk.store.is_authenticated());
    assert!(ctx.navigator.redirects().is_empty());
}

/// Several events landing after the budget end the session only once.
#[test]
fn test_timeout_fires_once_under_event_burst() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.clock.advance(16 * MINUTE);

    let watchdog = ctx.desk.watchdog.clone();
    let verdicts: Vec<IdleVerdict> = std::thread::scope(|scope| {
        let handles: Vec<_> = [
            ActivityKind::Click,
            ActivityKind::KeyDown,
            ActivityKind::MouseMove,
            ActivityKind::Wheel,
            ActivityKind::TouchStart,
            ActivityKind::Focus,
        ]
        .into_iter()
        .map(|kind| {
            let watchdog = &watchdog;
            scope.spawn(move || watchdog.record_activity(kind))
        })
        .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let fired = verdicts
        .iter()
        .filter(|v| **v == IdleVerdict::TimedOut)
        .count();
    assert_eq!(fired, 1, "verdicts: {:?}", verdicts);
    assert_eq!(ctx.desk.watchdog.check(), IdleVerdict::Unarmed);
    assert_eq!(ctx.notifier.notices().len(), 1);
    assert_eq!(ctx.navigator.count(), 1);
}

/// Activity is written at most once per throttle window, and each write
/// pushes the deadline out.
#[test]
fn test_activity_throttle_and_extension() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    let watchdog = &ctx.desk.watchdog;
    let signed_in_at = ctx.desk.store.last_activity().unwrap();

    ctx.clock.advance(Duration::from_secs(3));
    assert_eq!(watchdog.record_activity(ActivityKind::Click), IdleVerdict::Throttled);
    assert_eq!(ctx.desk.store.last_activity(), Some(signed_in_at));

    ctx.clock.advance(Duration::from_secs(3));
    assert_eq!(watchdog.record_activity(ActivityKind::KeyDown), IdleVerdict::Recorded);
    assert_eq!(ctx.desk.store.last_activity(), Some(signed_in_at + 6_000));
    assert_eq!(
        ctx.storage.stored().unwrap().last_activity,
        Some(signed_in_at + 6_000)
    );

    // 14 more minutes is 14m06s after sign-in but only 14m after the last write.
    ctx.clock.advance(14 * MINUTE);
    assert!(matches!(watchdog.check(), IdleVerdict::Active { .. }));

    ctx.clock.advance(MINUTE);
    assert_eq!(watchdog.check(), IdleVerdict::TimedOut);
}

/// A tab becoming hidden is not activity; becoming visible is.
#[test]
fn test_visibility_changes() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.clock.advance(Duration::from_secs(10));

    let watchdog = &ctx.desk.watchdog;
    assert_eq!(
        watchdog.record_activity(ActivityKind::Visibility { visible: false }),
        IdleVerdict::Ignored
    );
    assert_eq!(
        watchdog.record_activity(ActivityKind::Visibility { visible: true }),
        IdleVerdict::Recorded
    );
}

/// After a timeout and a fresh login the watchdog is armed again.
#[tokio::test]
async fn test_relogin_rearms_watchdog() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.clock.advance(16 * MINUTE);
    assert_eq!(ctx.desk.watchdog.check(), IdleVerdict::TimedOut);

    ctx.transport.respond(
        Method::Post,
        "/auth/login",
        200,
        fixtures::token_json("access-9", "refresh-9"),
    );
    ctx.transport.respond(
        Method::Get,
        "/auth/me",
        200,
        fixtures::me_json(&fixtures::auditor()),
    );
    ctx.desk
        .auth
        .login(&desk_core::LoginPayload::new("hr01", "secret"))
        .await
        .unwrap();
    assert!(matches!(ctx.desk.watchdog.check(), IdleVerdict::Active { .. }));

    ctx.clock.advance(16 * MINUTE);
    assert_eq!(ctx.desk.watchdog.check(), IdleVerdict::TimedOut);
    assert_eq!(ctx.navigator.count(), 2);
}

/// The background idle check ends an idle session without user input.
#[tokio::test]
async fn test_scheduler_idle_check_ends_session() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.desk.watchdog.set_location("/contracts");

    let feed = Arc::new(NotificationFeed::new());
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications/unread-count",
        200,
        fixtures::unread_json(4),
    );
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications",
        200,
        fixtures::notification_list(4, 4),
    );
    let scheduler = Arc::new(WorkerScheduler::new(
        WorkerConfig {
            idle_check_interval: Duration::from_millis(10),
            unread_poll_interval: Duration::from_secs(3600),
            notifications_poll_interval: Duration::from_secs(3600),
            metrics_log_interval: None,
            ..WorkerConfig::default()
        },
        ctx.desk.watchdog.clone(),
        ctx.desk.profile.clone(),
        feed.clone(),
    ));
    let handle = scheduler.start();

    ctx.clock.advance(16 * MINUTE);
    tokio::time::timeout(Duration::from_secs(2), async {
        while ctx.navigator.count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Idle check never fired");
    handle.shutdown().await;

    assert!(!ctx.desk.store.is_authenticated());
    assert_eq!(ctx.navigator.count(), 1);
    assert_eq!(
        ctx.navigator.redirects()[0].from.as_deref(),
        Some("/contracts")
    );
    assert_eq!(feed.unread(), 0, "Feed is reset when the session ends");
}

//! Tests for the session lifecycle: login, restore, route guarding, logout
//! and the background pollers that run while signed in.

use client::{families, GuardDecision, Method, QueryKey};
use desk_core::{LoginPayload, Session};
use integration_tests::fixtures::{self, ACCESS_TOKEN, REFRESH_TOKEN, USER_NAME};
use integration_tests::setup::TestContext;
use serde_json::json;
use std::sync::Arc;
use worker::{NotificationFeed, WorkerConfig, WorkerScheduler};

fn persisted() -> Session {
    Session {
        access_token: Some(ACCESS_TOKEN.to_string()),
        refresh_token: Some(REFRESH_TOKEN.to_string()),
        last_activity: Some(1_790_000_000_000),
        ..Session::default()
    }
}

fn scheduler(ctx: &TestContext) -> WorkerScheduler {
    WorkerScheduler::new(
        WorkerConfig::default(),
        ctx.desk.watchdog.clone(),
        ctx.desk.profile.clone(),
        Arc::new(NotificationFeed::new()),
    )
}

#[tokio::test]
async fn test_login_stores_tokens_and_identity() {
    let ctx = TestContext::new();
    ctx.transport.respond(
        Method::Post,
        "/auth/login",
        200,
        fixtures::token_json(ACCESS_TOKEN, REFRESH_TOKEN),
    );
    ctx.transport.protect(
        Method::Get,
        "/auth/me",
        ACCESS_TOKEN,
        fixtures::me_json(&fixtures::auditor()),
    );
    assert_eq!(ctx.desk.guard.check("/approvals"), GuardDecision::Pending);

    let me = ctx
        .desk
        .auth
        .login(&LoginPayload::new("hr01", "secret"))
        .await
        .unwrap();

    assert_eq!(me.user.identifier(), USER_NAME);
    let store = &ctx.desk.store;
    assert_eq!(store.access_token().as_deref(), Some(ACCESS_TOKEN));
    assert_eq!(store.refresh_token().as_deref(), Some(REFRESH_TOKEN));
    assert_eq!(store.last_activity(), Some(ctx.now_ms()));
    assert_eq!(store.user_identifier(), USER_NAME);
    assert!(store.can_audit());
    assert!(!store.is_superuser());
    assert!(!store.is_initializing());

    let stored = ctx.storage.stored().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some(ACCESS_TOKEN));
    assert_eq!(stored.user.unwrap().username, "hr01");

    let login = &ctx.transport.calls_to(Method::Post, "/auth/login")[0];
    assert_eq!(login.bearer, None);
    assert_eq!(login.body.as_ref().unwrap()["username"], "hr01");

    assert_eq!(ctx.desk.guard.check("/approvals"), GuardDecision::Allow);
    assert!(ctx.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_restore_revalidates_persisted_session() {
    let ctx = TestContext::with_persisted(persisted());
    ctx.transport.protect(
        Method::Get,
        "/auth/me",
        ACCESS_TOKEN,
        fixtures::me_json(&fixtures::superuser()),
    );

    assert!(ctx.desk.auth.restore().await.unwrap());

    assert!(ctx.desk.store.is_superuser());
    assert!(!ctx.desk.store.is_initializing());
    assert_eq!(ctx.desk.guard.check("/users"), GuardDecision::Allow);
}

/// A persisted session whose tokens are both dead ends at the login page.
#[tokio::test]
async fn test_restore_with_dead_tokens_signs_out() {
    let ctx = TestContext::with_persisted(persisted());
    ctx.transport.protect(
        Method::Get,
        "/auth/me",
        fixtures::REFRESHED_ACCESS_TOKEN,
        fixtures::me_json(&fixtures::auditor()),
    );
    ctx.refresh_fails(0);

    assert!(!ctx.desk.auth.restore().await.unwrap());

    assert!(!ctx.desk.store.is_authenticated());
    assert!(!ctx.desk.store.is_initializing());
    assert_eq!(ctx.transport.refresh_calls(), 1);

    match ctx.desk.guard.check("/approvals") {
        GuardDecision::Redirect(redirect) => {
            assert_eq!(redirect.to, "/login");
            assert_eq!(redirect.from.as_deref(), Some("/approvals"));
        }
        other => panic!("Expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_restore_without_persisted_session() {
    let ctx = TestContext::new();

    assert!(!ctx.desk.auth.restore().await.unwrap());

    assert!(ctx.transport.calls().is_empty());
    assert!(!ctx.desk.store.is_initializing());
    assert!(matches!(
        ctx.desk.guard.check("/dashboard"),
        GuardDecision::Redirect(_)
    ));
    assert_eq!(ctx.navigator.count(), 1);
}

/// Logout drops the local session and cached data even when the server
/// cannot be reached.
#[tokio::test]
async fn test_logout_clears_session_when_offline() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications/unread-count",
        200,
        fixtures::unread_json(2),
    );
    assert_eq!(ctx.desk.profile.unread_count().await.unwrap(), 2);
    let badge = QueryKey::family(families::UNREAD_COUNT);
    assert!(ctx.desk.cache.contains(&badge));

    ctx.transport.set_should_fail(true);
    ctx.desk.auth.logout().await;

    assert!(!ctx.desk.store.is_authenticated());
    assert!(ctx.desk.store.snapshot().user.is_none());
    assert!(ctx.storage.stored().is_none());
    assert!(!ctx.desk.cache.contains(&badge));
    assert_eq!(ctx.transport.count(Method::Post, "/auth/logout"), 1);
}

#[tokio::test]
async fn test_pollers_publish_to_feed() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications/unread-count",
        200,
        fixtures::unread_json(5),
    );
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications",
        200,
        fixtures::notification_list(3, 2),
    );
    let scheduler = scheduler(&ctx);
    let mut unread = scheduler.feed().subscribe_unread();

    scheduler.poll_unread().await;
    assert_eq!(*unread.borrow_and_update(), 5);

    scheduler.poll_notifications().await;
    assert_eq!(scheduler.feed().unread(), 2);
    let list = scheduler.feed().subscribe_notifications().borrow().clone().unwrap();
    assert_eq!(list.items.len(), 3);

    let polled = ctx.transport.calls_to(Method::Get, "/profile/notifications");
    assert_eq!(polled[0].query_value("skip"), Some("0"));
    assert_eq!(polled[0].query_value("limit"), Some("20"));
}

/// Polls always go to the server, even when a cached value exists.
#[tokio::test]
async fn test_pollers_bypass_cache() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.transport.respond(
        Method::Get,
        "/profile/notifications/unread-count",
        200,
        json!({ "unread_count": 1 }),
    );
    let scheduler = scheduler(&ctx);

    ctx.desk.profile.unread_count().await.unwrap();
    scheduler.poll_unread().await;
    scheduler.poll_unread().await;

    assert_eq!(
        ctx.transport
            .count(Method::Get, "/profile/notifications/unread-count"),
        3
    );
}

#[tokio::test]
async fn test_pollers_skip_while_signed_out() {
    let ctx = TestContext::new();
    let scheduler = scheduler(&ctx);

    scheduler.poll_unread().await;
    scheduler.poll_notifications().await;

    assert!(ctx.transport.calls().is_empty());
    assert_eq!(scheduler.feed().unread(), 0);
}

/// A rejected login still finishes initializing, so the guard redirects
/// instead of waiting forever.
#[tokio::test]
async fn test_failed_login_finishes_initializing() {
    let ctx = TestContext::new();
    ctx.transport.respond(
        Method::Post,
        "/auth/login",
        401,
        json!({ "detail": "Incorrect username or password" }),
    );
    assert!(ctx.desk.store.is_initializing());

    let result = ctx
        .desk
        .auth
        .login(&LoginPayload::new("hr01", "wrong"))
        .await;

    assert!(result.is_err());
    assert!(!ctx.desk.store.is_initializing());
    match ctx.desk.guard.check("/dashboard") {
        GuardDecision::Redirect(redirect) => {
            assert_eq!(redirect.to, "/login");
            assert_eq!(redirect.from.as_deref(), Some("/dashboard"));
        }
        other => panic!("Expected redirect, got {:?}", other),
    }
}

/// Same when the tokens arrive but the identity lookup fails.
#[tokio::test]
async fn test_login_with_failing_identity_lookup_finishes_initializing() {
    let ctx = TestContext::new();
    ctx.transport.respond(
        Method::Post,
        "/auth/login",
        200,
        fixtures::token_json(ACCESS_TOKEN, REFRESH_TOKEN),
    );
    ctx.transport
        .respond(Method::Get, "/auth/me", 500, json!({ "detail": "boom" }));

    assert!(ctx
        .desk
        .auth
        .login(&LoginPayload::new("hr01", "secret"))
        .await
        .is_err());
    assert!(!ctx.desk.store.is_initializing());
}

//! Tests for the token refresh pipeline.
//!
//! These tests verify that concurrent 401s share one refresh call, that a
//! failed refresh ends the session exactly once, and that a retried request
//! is never retried again.

use client::{ApiRequest, Method};
use desk_core::{Error, ErrorClass, SessionEnd};
use integration_tests::fixtures::{self, ACCESS_TOKEN, REFRESHED_ACCESS_TOKEN};
use integration_tests::mocks::MockReply;
use integration_tests::setup::TestContext;
use serde_json::{json, Value};
use std::time::Duration;
use telemetry::metrics;

fn protect_routes(ctx: &TestContext, token: &str) {
    for path in ["/profile/me", "/dashboard/stats", "/approvals/stats/overview"] {
        ctx.transport
            .protect(Method::Get, path, token, json!({ "path": path }));
    }
}

/// Three requests rejected together wait on a single refresh and all
/// succeed with the new token.
#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    protect_routes(&ctx, REFRESHED_ACCESS_TOKEN);
    ctx.refresh_succeeds(REFRESHED_ACCESS_TOKEN, 50);

    let refreshes_before = metrics().refresh_calls.get();
    let queued_before = metrics().retries_queued.get();

    let client = &ctx.desk.client;
    let (a, b, c) = tokio::join!(
        client.fetch::<Value>(ApiRequest::get("/profile/me")),
        client.fetch::<Value>(ApiRequest::get("/dashboard/stats")),
        client.fetch::<Value>(ApiRequest::get("/approvals/stats/overview")),
    );

    assert_eq!(a.unwrap()["path"], "/profile/me");
    assert_eq!(b.unwrap()["path"], "/dashboard/stats");
    assert_eq!(c.unwrap()["path"], "/approvals/stats/overview");

    assert_eq!(ctx.transport.refresh_calls(), 1, "Expected exactly one refresh");
    assert_eq!(
        ctx.desk.store.access_token().as_deref(),
        Some(REFRESHED_ACCESS_TOKEN)
    );
    assert_eq!(ctx.desk.store.refresh_token().as_deref(), Some("refresh-2"));

    for path in ["/profile/me", "/dashboard/stats", "/approvals/stats/overview"] {
        let calls = ctx.transport.calls_to(Method::Get, path);
        assert_eq!(calls.len(), 2, "{} should be sent once and retried once", path);
        assert_eq!(calls[0].bearer.as_deref(), Some(ACCESS_TOKEN));
        assert_eq!(calls[1].bearer.as_deref(), Some(REFRESHED_ACCESS_TOKEN));
    }
    assert!(ctx.navigator.redirects().is_empty());
    assert!(!ctx.desk.client.refresh_coordinator().is_refreshing());

    // Other tests share the global metrics, so only lower bounds hold.
    assert!(metrics().refresh_calls.get() > refreshes_before);
    assert!(metrics().retries_queued.get() >= queued_before + 2);
}

/// The refresh call carries the refresh token and no bearer.
#[tokio::test]
async fn test_refresh_request_shape() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    protect_routes(&ctx, REFRESHED_ACCESS_TOKEN);
    ctx.refresh_succeeds(REFRESHED_ACCESS_TOKEN, 0);

    ctx.desk
        .client
        .fetch::<Value>(ApiRequest::get("/profile/me"))
        .await
        .unwrap();

    let refresh = ctx.transport.calls_to(Method::Post, "/auth/refresh");
    assert_eq!(refresh.len(), 1);
    assert_eq!(refresh[0].bearer, None);
    assert_eq!(
        refresh[0].body.as_ref().unwrap()["refresh_token"],
        fixtures::REFRESH_TOKEN
    );
}

/// A rejected refresh fails every queued request and redirects once.
#[tokio::test]
async fn test_refresh_failure_rejects_all_and_redirects() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    protect_routes(&ctx, REFRESHED_ACCESS_TOKEN);
    ctx.refresh_fails(30);

    let client = &ctx.desk.client;
    let (a, b, c) = tokio::join!(
        client.fetch::<Value>(ApiRequest::get("/profile/me")),
        client.fetch::<Value>(ApiRequest::get("/dashboard/stats")),
        client.fetch::<Value>(ApiRequest::get("/approvals/stats/overview")),
    );

    for result in [a, b, c] {
        assert!(
            matches!(result, Err(Error::Session(SessionEnd::RefreshRejected))),
            "Expected RefreshRejected, got {:?}",
            result
        );
    }
    assert_eq!(ctx.transport.refresh_calls(), 1);
    assert!(!ctx.desk.store.is_authenticated());
    assert!(ctx.desk.store.refresh_token().is_none());
    assert!(ctx.storage.stored().is_none());

    let redirects = ctx.navigator.redirects();
    assert_eq!(redirects.len(), 1, "Session should end exactly once");
    assert_eq!(redirects[0].to, "/login");
    assert!(ctx.notifier.notices().is_empty(), "Session end carries no notice");
}

/// Without a refresh token a 401 ends the session on the spot.
#[tokio::test]
async fn test_401_without_refresh_token_redirects() {
    let ctx = TestContext::new();
    ctx.sign_in_with(fixtures::auditor(), ACCESS_TOKEN, None);
    protect_routes(&ctx, REFRESHED_ACCESS_TOKEN);

    let result = ctx
        .desk
        .client
        .fetch::<Value>(ApiRequest::get("/profile/me"))
        .await;

    assert!(matches!(
        result,
        Err(Error::Session(SessionEnd::NoRefreshToken))
    ));
    assert_eq!(ctx.transport.refresh_calls(), 0);
    assert!(!ctx.desk.store.is_authenticated());
    assert_eq!(ctx.navigator.count(), 1);
}

/// A request retried after a refresh is not retried a second time.
#[tokio::test]
async fn test_retried_request_is_not_retried_again() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.transport.respond(
        Method::Get,
        "/profile/me",
        401,
        json!({ "detail": "Not authenticated" }),
    );
    ctx.refresh_succeeds(REFRESHED_ACCESS_TOKEN, 0);

    let err = ctx
        .desk
        .client
        .fetch::<Value>(ApiRequest::get("/profile/me"))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::TokenExpired);
    assert_eq!(err.http_status(), Some(401));
    assert_eq!(ctx.transport.refresh_calls(), 1);
    assert_eq!(ctx.transport.count(Method::Get, "/profile/me"), 2);
    assert!(ctx.desk.store.is_authenticated(), "Refreshed session is kept");
}

/// A 401 for a token that was already replaced retries with the current
/// token and does not refresh.
#[tokio::test]
async fn test_stale_token_retries_without_refresh() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.refresh_fails(0);
    ctx.transport.on(Method::Get, "/profile/me", |_, bearer| {
        if bearer == Some(REFRESHED_ACCESS_TOKEN) {
            MockReply::json(200, json!({ "ok": true }))
        } else {
            MockReply::json(401, json!({ "detail": "Token expired" }))
                .after(Duration::from_millis(30))
        }
    });

    let store = ctx.desk.store.clone();
    let (result, _) = tokio::join!(
        ctx.desk.client.fetch::<Value>(ApiRequest::get("/profile/me")),
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.set_tokens(&fixtures::tokens(REFRESHED_ACCESS_TOKEN, Some("refresh-2")));
        }
    );

    assert_eq!(result.unwrap()["ok"], true);
    assert_eq!(ctx.transport.refresh_calls(), 0);
    let calls = ctx.transport.calls_to(Method::Get, "/profile/me");
    assert_eq!(calls[1].bearer.as_deref(), Some(REFRESHED_ACCESS_TOKEN));
}

/// Requests after a refresh go out with the new token directly.
#[tokio::test]
async fn test_later_requests_use_refreshed_token() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    protect_routes(&ctx, REFRESHED_ACCESS_TOKEN);
    ctx.refresh_succeeds(REFRESHED_ACCESS_TOKEN, 0);

    let client = &ctx.desk.client;
    client.fetch::<Value>(ApiRequest::get("/profile/me")).await.unwrap();
    ctx.transport.clear();

    client
        .fetch::<Value>(ApiRequest::get("/dashboard/stats"))
        .await
        .unwrap();
    let calls = ctx.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].bearer.as_deref(), Some(REFRESHED_ACCESS_TOKEN));
}

/// A wrong password is left to the login form: no refresh, no notice.
#[tokio::test]
async fn test_login_401_is_not_refreshed() {
    let ctx = TestContext::new();
    ctx.transport.respond(
        Method::Post,
        "/auth/login",
        401,
        json!({ "detail": "Incorrect username or password" }),
    );

    let err = ctx
        .desk
        .auth
        .login(&desk_core::LoginPayload::new("hr01", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::LoginRejected);
    assert_eq!(err.detail(), Some("Incorrect username or password"));
    assert_eq!(ctx.transport.refresh_calls(), 0);
    assert!(ctx.notifier.notices().is_empty());
    assert!(ctx.navigator.redirects().is_empty());
}

/// A 401 that lands after a failed refresh already ended the session does
/// not end it a second time.
#[tokio::test]
async fn test_late_401_after_failed_refresh_redirects_once() {
    let ctx = TestContext::new();
    ctx.sign_in(fixtures::auditor());
    ctx.refresh_fails(20);
    ctx.transport.respond(
        Method::Get,
        "/profile/me",
        401,
        json!({ "detail": "Token expired" }),
    );
    ctx.transport.on(Method::Get, "/dashboard/stats", |_, _| {
        MockReply::json(401, json!({ "detail": "Token expired" }))
            .after(Duration::from_millis(80))
    });

    let client = &ctx.desk.client;
    let (early, late) = tokio::join!(
        client.fetch::<Value>(ApiRequest::get("/profile/me")),
        client.fetch::<Value>(ApiRequest::get("/dashboard/stats")),
    );

    assert!(matches!(
        early,
        Err(Error::Session(SessionEnd::RefreshRejected))
    ));
    assert!(matches!(late, Err(Error::Session(_))));
    assert_eq!(ctx.transport.refresh_calls(), 1);
    assert_eq!(ctx.navigator.count(), 1, "Session should end exactly once");
    assert_eq!(ctx.transport.count(Method::Get, "/dashboard/stats"), 1);
}

//! Mock implementations for testing.

use async_trait::async_trait;
use client::{ApiRequest, ApiResponse, LoginRedirect, Method, Navigator, Notice, Notifier, Transport};
use desk_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// What a scripted route answers.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(ApiResponse),
    /// Answer after a delay, to hold requests in flight.
    Delayed(Duration, ApiResponse),
    /// Fail at the transport level.
    NetworkDown,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::Respond(ApiResponse::json_body(status, &body))
    }

    pub fn empty(status: u16) -> Self {
        Self::Respond(ApiResponse::new(status, ""))
    }

    pub fn after(self, delay: Duration) -> Self {
        match self {
            Self::Respond(response) | Self::Delayed(_, response) => Self::Delayed(delay, response),
            Self::NetworkDown => Self::NetworkDown,
        }
    }
}

type Responder = Arc<dyn Fn(&ApiRequest, Option<&str>) -> MockReply + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    responder: Responder,
}

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl RecordedCall {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Mock transport that answers from scripted routes and records every call.
///
/// This implements the same `Transport` trait as the reqwest transport, so
/// the whole request pipeline (bearer injection, refresh, notices) runs
/// unchanged. Unscripted routes answer 404.
#[derive(Clone)]
pub struct MockTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// Simulate a dead network if set.
    should_fail: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Script a route. Later registrations win over earlier ones.
    pub fn on<F>(&self, method: Method, path: &str, responder: F)
    where
        F: Fn(&ApiRequest, Option<&str>) -> MockReply + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            responder: Arc::new(responder),
        });
    }

    /// Script a route with a fixed JSON answer.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.on(method, path, move |_, _| MockReply::json(status, body.clone()));
    }

    /// Script a route that only accepts `token` and answers 401 otherwise.
    pub fn protect(&self, method: Method, path: &str, token: &str, body: Value) {
        let token = token.to_string();
        self.on(method, path, move |_, bearer| {
            if bearer == Some(token.as_str()) {
                MockReply::json(200, body.clone())
            } else {
                MockReply::json(401, serde_json::json!({ "detail": "Token expired" }))
            }
        });
    }

    /// Get all captured calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls made to one route.
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }

    pub fn refresh_calls(&self) -> usize {
        self.count(Method::Post, "/auth/refresh")
    }

    /// Clear captured calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Set failure mode for testing network errors.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn responder_for(&self, request: &ApiRequest) -> Option<Responder> {
        let path = request.bare_path();
        self.routes
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == path)
            .map(|r| r.responder.clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        self.calls.lock().push(RecordedCall {
            method: request.method,
            path: request.bare_path().to_string(),
            query: request.query.clone(),
            bearer: bearer.map(str::to_string),
            body: match &request.body {
                Some(client::RequestBody::Json(value)) => Some(value.clone()),
                _ => None,
            },
        });

        if *self.should_fail.lock() {
            return Err(Error::network("Mock transport failure"));
        }

        let reply = match self.responder_for(request) {
            Some(responder) => responder(request, bearer),
            None => MockReply::json(404, serde_json::json!({ "detail": "Not Found" })),
        };

        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::Delayed(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            MockReply::NetworkDown => Err(Error::network("connection refused")),
        }
    }
}

/// Notifier that captures notices in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|n| n.message.clone()).collect()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Navigator that captures login redirects in memory.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<LoginRedirect>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<LoginRedirect> {
        self.redirects.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.redirects.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, redirect: LoginRedirect) {
        self.redirects.lock().push(redirect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_records_and_routes() {
        let transport = MockTransport::new();
        transport.respond(Method::Get, "/auth/me", 200, serde_json::json!({ "ok": true }));

        let response = transport
            .send(&ApiRequest::get("/auth/me").query("x", "1"), Some("t"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let missing = transport.send(&ApiRequest::get("/nope"), None).await.unwrap();
        assert_eq!(missing.status, 404);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].bearer.as_deref(), Some("t"));
        assert_eq!(calls[0].query_value("x"), Some("1"));
    }

    #[tokio::test]
    async fn test_mock_transport_failure_mode() {
        let transport = MockTransport::new();
        transport.set_should_fail(true);
        let result = transport.send(&ApiRequest::get("/auth/me"), None).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(transport.count(Method::Get, "/auth/me"), 1);
    }
}

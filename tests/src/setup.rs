//! Common test setup functions.

use client::{ClientConfig, Desk, MemoryStorage, Method, Navigator, Notifier, SessionStorage, Transport};
use desk_core::{Clock, ManualClock, MeResponse, Session, SharedClock};
use std::sync::Arc;
use std::time::Duration;
use telemetry::TracingConfig;

use crate::fixtures;
use crate::mocks::{MockReply, MockTransport, RecordingNavigator, RecordingNotifier};

/// Test context with a scripted backend and a manual clock.
///
/// This runs the same production code paths by:
/// - Building the real `Desk` through `DeskBuilder`
/// - Using `MockTransport`, which implements the `Transport` trait
/// - Capturing notices and login redirects instead of rendering them
pub struct TestContext {
    pub desk: Desk,
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
    pub storage: Arc<MemoryStorage>,
    pub clock: ManualClock,
}

impl TestContext {
    /// Create a signed-out context.
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    /// Create a context whose storage already holds `session`, as after a
    /// page reload.
    pub fn with_persisted(session: Session) -> Self {
        Self::with_storage(MemoryStorage::with_session(session))
    }

    fn with_storage(storage: MemoryStorage) -> Self {
        init_test_tracing();

        let transport = Arc::new(MockTransport::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let storage = Arc::new(storage);
        let clock = ManualClock::new(1_790_000_000_000);

        let desk = Desk::builder(ClientConfig::default())
            .transport(transport.clone() as Arc<dyn Transport>)
            .storage(storage.clone() as Arc<dyn SessionStorage>)
            .notifier(notifier.clone() as Arc<dyn Notifier>)
            .navigator(navigator.clone() as Arc<dyn Navigator>)
            .clock(Arc::new(clock.clone()) as SharedClock)
            .build()
            .expect("Failed to build desk");

        Self {
            desk,
            transport,
            notifier,
            navigator,
            storage,
            clock,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Put a signed-in session straight into the store, skipping `/auth/login`.
    pub fn sign_in(&self, me: MeResponse) {
        self.sign_in_with(me, fixtures::ACCESS_TOKEN, Some(fixtures::REFRESH_TOKEN));
    }

    pub fn sign_in_with(&self, me: MeResponse, access: &str, refresh: Option<&str>) {
        let store = &self.desk.store;
        store.set_tokens(&fixtures::tokens(access, refresh));
        store.set_session(me);
        store.set_initializing(false);
    }

    /// Script `/auth/refresh` to rotate to `access` after `delay_ms`.
    pub fn refresh_succeeds(&self, access: &str, delay_ms: u64) {
        let body = fixtures::token_json(access, "refresh-2");
        self.transport.on(Method::Post, "/auth/refresh", move |_, _| {
            MockReply::json(200, body.clone())
                .after(Duration::from_millis(delay_ms))
        });
    }

    /// Script `/auth/refresh` to reject after `delay_ms`.
    pub fn refresh_fails(&self, delay_ms: u64) {
        self.transport.on(Method::Post, "/auth/refresh", move |_, _| {
            MockReply::json(
                401,
                serde_json::json!({ "detail": "Invalid refresh token" }),
            )
            .after(Duration::from_millis(delay_ms))
        });
    }

    /// Script `/approvals/tasks` with a fixed page.
    pub fn serve_tasks(&self, tasks: Vec<serde_json::Value>) {
        self.transport.respond(
            Method::Get,
            "/approvals/tasks",
            200,
            fixtures::task_page(tasks, 1),
        );
    }
}

/// Route client logs to the test output; set `RUST_LOG` to see more.
fn init_test_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    telemetry::init_tracing(TracingConfig::new().with_filter(filter));
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

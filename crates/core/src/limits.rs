//! Timing defaults for the session lifecycle and background polling.
//!
//! These are product decisions; every one of them can be overridden
//! through `SessionPolicy` / `WorkerConfig` at construction time.

use std::time::Duration;

// === Session ===

/// Inactivity budget before the session is force-terminated (15 minutes).
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Minimum spacing between two `last_activity` writes (5 seconds).
pub const ACTIVITY_WRITE_THROTTLE: Duration = Duration::from_secs(5);

/// How often the idle watchdog re-checks the budget (30 seconds).
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// A request rejected with 401 is retried at most this many times.
pub const MAX_AUTH_RETRIES: u32 = 1;

// === HTTP ===

/// Request timeout for every REST call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default API base URL when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

// === Polling ===

/// Unread notification count refetch interval.
pub const UNREAD_COUNT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Notification list refetch interval.
pub const NOTIFICATIONS_POLL_INTERVAL: Duration = Duration::from_secs(30);

// === Routes ===

/// Login surface every forced logout redirects to.
pub const LOGIN_PATH: &str = "/login";

/// Permission required to read the approval workflow.
pub const AUDIT_PERMISSION: &str = "contracts.audit";

/// Permission wildcard granting every code.
pub const WILDCARD_PERMISSION: &str = "*";

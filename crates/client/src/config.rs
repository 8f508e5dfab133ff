//! Client configuration.

use desk_core::limits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// REST client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL, e.g. "http://localhost:8000/api"
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Query cache capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Query cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Where the session is persisted; `None` keeps it in memory
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub session: SessionPolicy,
}

fn default_base_url() -> String {
    limits::DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    limits::REQUEST_TIMEOUT.as_millis() as u64
}

fn default_cache_capacity() -> u64 {
    1_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            session_file: None,
            session: SessionPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Timing and retry policy for the session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Inactivity budget in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Minimum gap between persisted activity writes, in milliseconds
    #[serde(default = "default_activity_throttle_ms")]
    pub activity_throttle_ms: u64,
    /// Idle check period in seconds
    #[serde(default = "default_idle_check_secs")]
    pub idle_check_secs: u64,
    /// How many times one request may be retried after a 401
    #[serde(default = "default_max_auth_retries")]
    pub max_auth_retries: u32,
    /// Where unauthenticated users are sent
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_idle_timeout_secs() -> u64 {
    limits::SESSION_IDLE_TIMEOUT.as_secs()
}

fn default_activity_throttle_ms() -> u64 {
    limits::ACTIVITY_WRITE_THROTTLE.as_millis() as u64
}

fn default_idle_check_secs() -> u64 {
    limits::IDLE_CHECK_INTERVAL.as_secs()
}

fn default_max_auth_retries() -> u32 {
    limits::MAX_AUTH_RETRIES
}

fn default_login_path() -> String {
    limits::LOGIN_PATH.to_string()
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            activity_throttle_ms: default_activity_throttle_ms(),
            idle_check_secs: default_idle_check_secs(),
            max_auth_retries: default_max_auth_retries(),
            login_path: default_login_path(),
        }
    }
}

impl SessionPolicy {
    pub fn idle_timeout_ms(&self) -> i64 {
        (self.idle_timeout_secs * 1000) as i64
    }

    pub fn activity_throttle_ms(&self) -> i64 {
        self.activity_throttle_ms as i64
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_secs.max(1))
    }
}

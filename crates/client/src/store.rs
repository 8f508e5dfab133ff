//! Session store with persistence.
//!
//! All mutations go through a handful of setters, each applied atomically
//! under the write lock and persisted before the lock is released so the
//! stored copy never runs behind memory.

use desk_core::{Clock, Error, MeResponse, Result, Session, SharedClock, TokenResponse};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable home of the session between process runs.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the session in memory only.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: parking_lot::Mutex<Option<Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, as if a previous run had saved `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: parking_lot::Mutex::new(Some(session)),
        }
    }

    pub fn stored(&self) -> Option<Session> {
        self.slot.lock().clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Persists the session as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<Session>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(format!("{}: {}", self.path.display(), e))),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Discarding unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("{}: {}", parent.display(), e)))?;
        }
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(session)?;
        std::fs::write(&tmp, json).map_err(|e| Error::storage(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::storage(format!("{}: {}", self.path.display(), e)))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(format!("{}: {}", self.path.display(), e))),
        }
    }
}

struct StoreInner {
    session: RwLock<Session>,
    /// True until the startup restore has settled. Not persisted.
    initializing: AtomicBool,
    storage: Arc<dyn SessionStorage>,
    clock: SharedClock,
}

/// Shared handle to the session. Clones see the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                session: RwLock::new(Session::default()),
                initializing: AtomicBool::new(true),
                storage,
                clock,
            }),
        }
    }

    /// Load the persisted session into memory. Returns whether it carried
    /// an access token.
    pub fn restore(&self) -> Result<bool> {
        let loaded = self.inner.storage.load()?.unwrap_or_default();
        let authenticated = loaded.is_authenticated();
        *self.inner.session.write() = loaded;
        debug!(authenticated, "Session restored from storage");
        Ok(authenticated)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.session.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.session.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.session.read().refresh_token.clone()
    }

    pub fn last_activity(&self) -> Option<i64> {
        self.inner.session.read().last_activity
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().is_authenticated()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.inner.session.read().has_permission(code)
    }

    pub fn can_audit(&self) -> bool {
        self.inner.session.read().can_audit()
    }

    pub fn is_superuser(&self) -> bool {
        self.inner.session.read().is_superuser()
    }

    pub fn user_identifier(&self) -> String {
        self.inner.session.read().user_identifier().to_string()
    }

    pub fn is_initializing(&self) -> bool {
        self.inner.initializing.load(Ordering::SeqCst)
    }

    pub fn set_initializing(&self, initializing: bool) {
        self.inner.initializing.store(initializing, Ordering::SeqCst);
    }

    /// Store a new token pair and stamp activity.
    pub fn set_tokens(&self, tokens: &TokenResponse) {
        let now = self.now_ms();
        self.mutate(|s| s.apply_tokens(tokens, now));
    }

    /// Drop credentials, identity and activity.
    pub fn clear_tokens(&self) {
        let mut session = self.inner.session.write();
        session.clear();
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    /// Store the identity snapshot.
    pub fn set_session(&self, me: MeResponse) {
        self.mutate(|s| s.apply_me(me));
    }

    /// Record activity at `at_ms`, or now.
    pub fn update_activity(&self, at_ms: Option<i64>) {
        let at = at_ms.unwrap_or_else(|| self.now_ms());
        self.mutate(|s| s.last_activity = Some(at));
    }

    fn mutate<F: FnOnce(&mut Session)>(&self, apply: F) {
        let mut session = self.inner.session.write();
        apply(&mut session);
        if let Err(e) = self.inner.storage.save(&session) {
            warn!(error = %e, "Failed to persist session");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.read();
        f.debug_struct("SessionStore")
            .field("authenticated", &session.is_authenticated())
            .field("last_activity", &session.last_activity)
            .field("initializing", &self.is_initializing())
            .finish()
    }
}

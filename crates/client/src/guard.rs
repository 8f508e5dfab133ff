//! Route guard for authenticated surfaces.

use std::sync::Arc;

use crate::hooks::{LoginRedirect, Navigator};
use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session restore still running; render nothing yet.
    Pending,
    Allow,
    Redirect(LoginRedirect),
}

pub struct AuthGuard {
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl AuthGuard {
    pub fn new(store: SessionStore, navigator: Arc<dyn Navigator>, login_path: impl Into<String>) -> Self {
        Self {
            store,
            navigator,
            login_path: login_path.into(),
        }
    }

    /// Decide whether `path` may be shown. Redirects are also sent to the
    /// navigator.
    pub fn check(&self, path: &str) -> GuardDecision {
        if self.store.is_initializing() {
            return GuardDecision::Pending;
        }
        if self.store.is_authenticated() {
            return GuardDecision::Allow;
        }
        let redirect = LoginRedirect::to(self.login_path.clone()).from_path(path);
        self.navigator.redirect(redirect.clone());
        GuardDecision::Redirect(redirect)
    }
}

//! Client-held session state.

use serde::{Deserialize, Serialize};

use crate::auth::{token_expiry_ms, TokenResponse};
use crate::limits::AUDIT_PERMISSION;
use crate::user::{has_any_permission, has_permission, AuthUser, MeResponse};

/// The persisted part of a session.
///
/// `access_token.is_some()` is the authentication predicate used by
/// route guards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry, epoch ms.
    pub expires_at: Option<i64>,
    /// Last observed user interaction, epoch ms.
    pub last_activity: Option<i64>,
    pub user: Option<AuthUser>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Session {
    /// Whether an access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Store a fresh token pair.
    ///
    /// Expiry comes from the token's `exp` claim, falling back to the
    /// server-supplied TTL. Activity is stamped at `now_ms`.
    pub fn apply_tokens(&mut self, token: &TokenResponse, now_ms: i64) {
        let decoded = token_expiry_ms(&token.access_token);
        let fallback = (token.expires_in > 0).then(|| now_ms + token.expires_in * 1000);

        self.access_token = Some(token.access_token.clone());
        self.refresh_token = token.refresh_token.clone();
        self.expires_at = decoded.or(fallback);
        self.last_activity = Some(now_ms);
    }

    /// Drop credentials, activity and identity.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Store the identity snapshot from `/auth/me`.
    pub fn apply_me(&mut self, me: MeResponse) {
        self.user = Some(me.user);
        self.permissions = me.permissions;
    }

    /// Milliseconds since the last recorded activity.
    pub fn idle_for_ms(&self, now_ms: i64) -> Option<i64> {
        self.last_activity.map(|last| now_ms - last)
    }

    /// Whether the access token is past its expiry.
    pub fn is_token_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|exp| now_ms >= exp)
    }

    pub fn has_permission(&self, code: &str) -> bool {
        has_permission(&self.permissions, code)
    }

    pub fn has_any_permission(&self, codes: &[&str]) -> bool {
        has_any_permission(&self.permissions, codes)
    }

    /// Whether the approval workflow may be read at all.
    pub fn can_audit(&self) -> bool {
        self.is_authenticated() && self.has_permission(AUDIT_PERMISSION)
    }

    pub fn is_superuser(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_superuser)
    }

    /// Approval identifier of the current user, empty when anonymous.
    pub fn user_identifier(&self) -> &str {
        self.user.as_ref().map(|u| u.identifier()).unwrap_or("")
    }
}

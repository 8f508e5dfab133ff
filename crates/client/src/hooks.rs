//! Outbound side effects: user-facing notices and login redirects.
//!
//! The request pipeline and the idle watchdog never render anything
//! themselves; they hand a [`Notice`] to a [`Notifier`] and a
//! [`LoginRedirect`] to a [`Navigator`].

use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Why the user is being sent to the login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// Inactivity budget exceeded.
    Timeout,
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// A navigation to the login surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Target path, normally "/login".
    pub to: String,
    /// Where the user was, so login can send them back.
    pub from: Option<String>,
    pub reason: Option<RedirectReason>,
}

impl LoginRedirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            to: path.into(),
            from: None,
            reason: None,
        }
    }

    pub fn from_path(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn because(mut self, reason: RedirectReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Render as a location, e.g. `/login?reason=timeout`.
    pub fn location(&self) -> String {
        match self.reason {
            Some(reason) => format!("{}?reason={}", self.to, reason),
            None => self.to.clone(),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn redirect(&self, redirect: LoginRedirect);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(notice = %notice.message, "Notice"),
            NoticeLevel::Warning => warn!(notice = %notice.message, "Notice"),
            NoticeLevel::Error => error!(notice = %notice.message, "Notice"),
        }
    }
}

/// Logs redirects; headless hosts have nowhere to navigate to.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect(&self, redirect: LoginRedirect) {
        warn!(
            location = %redirect.location(),
            from = redirect.from.as_deref().unwrap_or(""),
            "Redirecting to login"
        );
    }
}

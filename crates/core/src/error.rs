//! Unified error types for the contract desk client.
//!
//! Every failure is classified into an [`ErrorClass`] with a stable code:
//! - AUTH_EXPIRED / AUTH_LOGIN / SESSION: authentication lifecycle
//! - CONTRACT_CREATE: business rejections surfaced to the caller
//! - HTTP_403 / HTTP_404 / HTTP_500 / HTTP_OTHER: server-side failures
//! - NETWORK: no response at all
//! - VALIDATION: client-side checks, never sent to the server

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401 outside the login call, recovered by refresh-and-retry.
    TokenExpired,
    /// 401 on the login call, rendered inline by the login form.
    LoginRejected,
    /// Contract creation rejected with business detail.
    BusinessCreate,
    Forbidden,
    NotFound,
    Server,
    OtherHttp,
    Network,
    Validation,
    /// Session is gone (refresh failed, no refresh token, idle timeout).
    Session,
    Internal,
}

impl ErrorClass {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenExpired => "AUTH_EXPIRED",
            Self::LoginRejected => "AUTH_LOGIN",
            Self::BusinessCreate => "CONTRACT_CREATE",
            Self::Forbidden => "HTTP_403",
            Self::NotFound => "HTTP_404",
            Self::Server => "HTTP_500",
            Self::OtherHttp => "HTTP_OTHER",
            Self::Network => "NETWORK",
            Self::Validation => "VALIDATION",
            Self::Session => "SESSION",
            Self::Internal => "INTERNAL",
        }
    }

    /// Classify an HTTP status that was not handled by the refresh protocol.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::TokenExpired,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::Server,
            _ => Self::OtherHttp,
        }
    }
}

/// Why a session was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A 401 arrived and no refresh token was held.
    NoRefreshToken,
    /// The refresh endpoint rejected the refresh token.
    RefreshRejected,
    /// The refresh leader went away before publishing an outcome.
    RefreshAbandoned,
    /// The inactivity budget was exceeded.
    IdleTimeout,
    /// No access token is held.
    NotAuthenticated,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoRefreshToken => "no refresh token held",
            Self::RefreshRejected => "token refresh failed",
            Self::RefreshAbandoned => "token refresh abandoned",
            Self::IdleTimeout => "session timed out after inactivity",
            Self::NotAuthenticated => "not authenticated",
        };
        f.write_str(text)
    }
}

/// Unified error type for the contract desk client.
#[derive(Debug, Error)]
pub enum Error {
    /// Non-success HTTP response.
    #[error("[{}] HTTP {status}: {}", class.code(), detail.as_deref().unwrap_or("request failed"))]
    Http {
        status: u16,
        class: ErrorClass,
        /// `detail` field of the error body, if the server sent one.
        detail: Option<String>,
        body: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("session ended: {0}")]
    Session(SessionEnd),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid token: {0}")]
    Token(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an HTTP error from a status and raw body.
    ///
    /// The `detail` (or `message`) field is extracted when the body is JSON.
    pub fn http(status: u16, class: ErrorClass, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("message"))
                    .and_then(|d| d.as_str())
                    .map(str::to_string)
            });
        Self::Http {
            status,
            class,
            detail,
            body,
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn token(msg: impl Into<String>) -> Self {
        Self::Token(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Http { class, .. } => *class,
            Self::Network(_) => ErrorClass::Network,
            Self::Session(_) => ErrorClass::Session,
            Self::Validation(_) => ErrorClass::Validation,
            Self::PermissionDenied(_) => ErrorClass::Forbidden,
            Self::Token(_) | Self::Serialization(_) | Self::Storage(_) | Self::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Get the error code.
    pub fn error_code(&self) -> &'static str {
        self.class().code()
    }

    /// Get the HTTP status if the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-supplied detail message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Whether this is an authorization rejection (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        self.http_status() == Some(401)
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

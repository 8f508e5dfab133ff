//! Authentication payloads and access token inspection.
//!
//! This module provides:
//! - Login / refresh request and token response types
//! - Expiry decoding from the access token's `exp` claim
//! - Bearer header helpers

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};

/// Credentials posted to `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(custom(function = "validate_not_blank"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl LoginPayload {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body posted to `/auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Claims carried by the backend's access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    /// `access` or `refresh`.
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Decode token claims without verifying the signature.
///
/// The client never holds the signing key; the server re-verifies every token.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::token(e.to_string()))
}

/// Expiry of a token in epoch milliseconds, if it can be decoded.
pub fn token_expiry_ms(token: &str) -> Option<i64> {
    match decode_claims(token) {
        Ok(claims) => Some(claims.exp * 1000),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode access token expiry");
            None
        }
    }
}

/// Format an `Authorization` header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(crate) fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

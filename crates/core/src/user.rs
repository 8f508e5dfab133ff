//! Users, roles and permission snapshots.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::validate_not_blank;
use crate::limits::WILDCARD_PERMISSION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The authenticated user as returned by `/auth/me` and `/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub teacher_code: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub job_status: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

fn default_true() -> bool {
    true
}

impl Default for AuthUser {
    fn default() -> Self {
        Self {
            id: String::new(),
            username: String::new(),
            email: None,
            full_name: None,
            status: None,
            is_active: true,
            is_superuser: false,
            last_login: None,
            avatar_url: None,
            teacher_code: None,
            department: None,
            position: None,
            job_status: None,
            phone_number: None,
            roles: Vec::new(),
        }
    }
}

impl AuthUser {
    /// Name used to match approval owners and assignees.
    ///
    /// Full name when present, otherwise the username.
    pub fn identifier(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }
}

/// Identity and authorization snapshot fetched once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: AuthUser,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Check a permission code against a granted set, honoring the wildcard.
pub fn has_permission(granted: &[String], code: &str) -> bool {
    granted
        .iter()
        .any(|p| p == WILDCARD_PERMISSION || p == code)
}

/// Check whether any of `codes` is granted.
pub fn has_any_permission(granted: &[String], codes: &[&str]) -> bool {
    if granted.iter().any(|p| p == WILDCARD_PERMISSION) {
        return true;
    }
    codes.iter().any(|code| granted.iter().any(|p| p == code))
}

/// Human-readable label for a role.
///
/// The role's own description wins, then the built-in map, then the raw name.
pub fn role_display_label(role: &Role) -> String {
    if let Some(description) = role.description.as_deref() {
        return description.to_string();
    }
    role_name_label(&role.name)
}

/// Label for a bare role name.
pub fn role_name_label(name: &str) -> String {
    match name {
        "Administrator" => "System administrator",
        "HR" => "HR lead",
        "Auditor" => "Auditor",
        "Viewer" => "Guest",
        other => other,
    }
    .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub data: Vec<AuthUser>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleListResponse {
    pub data: Vec<Role>,
    pub total: u64,
}

/// Paging parameters for `/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateUserPayload {
    #[validate(custom(function = "validate_not_blank"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
}

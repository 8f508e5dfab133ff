//! Campus announcements.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::validate_not_blank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub campus_code: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_top: bool,
    pub created_by: String,
    #[serde(default)]
    pub created_by_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementList {
    pub total: u64,
    #[serde(default)]
    pub items: Vec<Announcement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementQuery {
    pub skip: u32,
    pub limit: u32,
}

impl Default for AnnouncementQuery {
    fn default() -> Self {
        Self { skip: 0, limit: 20 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AnnouncementPayload {
    #[validate(
        custom(function = "validate_not_blank", message = "a title is required"),
        length(max = 200, message = "title must be at most 200 characters")
    )]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_top: bool,
}

impl AnnouncementPayload {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementCreated {
    pub message: String,
    pub data: Announcement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementDeleted {
    pub message: String,
    pub id: String,
    #[serde(default)]
    pub created_by_name: Option<String>,
}

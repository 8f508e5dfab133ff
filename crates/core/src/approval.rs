//! Approval workflow records and request/response payloads.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::validate_not_blank;
use crate::page::Paginated;

/// Pipeline stages in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    Entry,
    Qualification,
    Probation,
    Signature,
    Renewal,
    Archive,
}

impl ApprovalStage {
    pub const ALL: [ApprovalStage; 6] = [
        Self::Entry,
        Self::Qualification,
        Self::Probation,
        Self::Signature,
        Self::Renewal,
        Self::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Qualification => "qualification",
            Self::Probation => "probation",
            Self::Signature => "signature",
            Self::Renewal => "renewal",
            Self::Archive => "archive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Entry => "Onboarding preparation",
            Self::Qualification => "Qualification review",
            Self::Probation => "Probation evaluation",
            Self::Signature => "Contract signing",
            Self::Renewal => "Renewal reminder",
            Self::Archive => "Review and archive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    InProgress,
    Completed,
    Returned,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Returned => "returned",
        }
    }

    /// Whether approve/return may still be applied.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Allowed client-visible transitions.
    ///
    /// `completed` and `returned` are terminal here; resubmission produces
    /// a new task server-side.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Completed)
                | (Self::InProgress, Self::Completed)
                | (Self::Pending, Self::Returned)
                | (Self::InProgress, Self::Returned)
        )
    }
}

/// Priority, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPriority {
    Low,
    Medium,
    High,
}

impl ApprovalPriority {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    #[serde(default)]
    pub completed: bool,
}

/// One stage of the approval pipeline for a contract/teacher pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTask {
    pub id: String,
    /// Empty when the task is not yet linked to a contract.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contract_id: String,
    pub teacher_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub department: String,
    pub stage: ApprovalStage,
    pub status: ApprovalStatus,
    pub priority: ApprovalPriority,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub owner: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub due_date: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub check_items: Vec<ChecklistItem>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub latest_action: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Status filter for the task list; `All` disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Only(ApprovalStatus),
    All,
}

impl Serialize for StatusFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Only(status) => serializer.serialize_str(status.as_str()),
            Self::All => serializer.serialize_str("all"),
        }
    }
}

/// Stage filter for the task list; `All` disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageFilter {
    Only(ApprovalStage),
    All,
}

impl Serialize for StageFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Only(stage) => serializer.serialize_str(stage.as_str()),
            Self::All => serializer.serialize_str("all"),
        }
    }
}

/// Query parameters for `/approvals/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ApprovalTaskQuery {
    pub status: StatusFilter,
    pub stage: StageFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: u32,
    /// Restrict to tasks the caller owns or is assigned to.
    pub filter_by_user: bool,
}

impl Default for ApprovalTaskQuery {
    fn default() -> Self {
        Self::new(StatusFilter::Only(ApprovalStatus::Pending), StageFilter::All, 1, 10)
    }
}

impl ApprovalTaskQuery {
    /// Build a query. A concrete stage narrows the list to the caller's own
    /// tasks; "all stages" is the management view.
    pub fn new(status: StatusFilter, stage: StageFilter, page: u32, page_size: u32) -> Self {
        Self {
            status,
            stage,
            keyword: None,
            page,
            page_size,
            filter_by_user: !matches!(stage, StageFilter::All),
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Stable string used as the cache key.
    pub fn cache_params(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub type ApprovalTaskList = Paginated<ApprovalTask>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStatsOverview {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub returned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStageSummary {
    pub stage: ApprovalStage,
    pub total: u64,
    pub pending: u64,
    pub completed: u64,
    pub overdue: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryRecord {
    pub id: String,
    pub task_id: String,
    pub action: String,
    pub operator: String,
    pub created_at: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Optional comment attached to an approve action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalActionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Return action payload; the comment is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReturnPayload {
    #[validate(custom(function = "validate_not_blank", message = "a return comment is required"))]
    pub comment: String,
}

impl ReturnPayload {
    /// Trim and validate the comment.
    pub fn new(comment: &str) -> crate::Result<Self> {
        let payload = Self {
            comment: comment.trim().to_string(),
        };
        payload.validate()?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalActionResponse {
    pub task: ApprovalTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub message: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAllTasksResponse {
    pub message: String,
    pub deleted_count: u64,
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReminderResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub notification_count: u64,
}

impl SendReminderResponse {
    /// Text shown after a reminder went out.
    pub fn summary(&self) -> String {
        if self.notification_count <= 1 {
            if self.message.is_empty() {
                "Reminder sent".to_string()
            } else {
                self.message.clone()
            }
        } else {
            format!("Reminder sent to {} owners", self.notification_count)
        }
    }
}

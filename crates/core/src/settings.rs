//! System settings: the approval workflow configuration and the contract
//! field catalog.
//!
//! Workflow stages carry the owner, assistants, SLA and reminder schedule
//! the backend uses when it spawns approval tasks.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::approval::ApprovalStage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowReminder {
    pub label: String,
    pub offset_days: i32,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A user who may own or assist a workflow stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignableUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStageConfig {
    pub id: String,
    pub key: ApprovalStage,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub order_index: i32,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub assistants: Vec<String>,
    #[serde(default)]
    pub owner: Option<AssignableUser>,
    #[serde(default)]
    pub sla_days: Option<i32>,
    #[serde(default)]
    pub sla_text: Option<String>,
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default)]
    pub reminders: Vec<WorkflowReminder>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub stages: Vec<WorkflowStageConfig>,
    #[serde(default)]
    pub available_users: Vec<AssignableUser>,
}

impl WorkflowConfig {
    /// Active stages in pipeline order.
    pub fn active_stages(&self) -> Vec<&WorkflowStageConfig> {
        let mut stages: Vec<_> = self.stages.iter().filter(|s| s.is_active).collect();
        stages.sort_by_key(|s| s.order_index);
        stages
    }

    pub fn stage(&self, key: ApprovalStage) -> Option<&WorkflowStageConfig> {
        self.stages.iter().find(|s| s.key == key)
    }
}

/// Partial update of one stage; unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStageUpdate {
    pub key: ApprovalStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_days: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<WorkflowReminder>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl WorkflowStageUpdate {
    pub fn new(key: ApprovalStage) -> Self {
        Self {
            key,
            owner_id: None,
            assistants: None,
            sla_days: None,
            sla_text: None,
            checklist: None,
            reminders: None,
            is_active: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_unique_stage_keys"))]
pub struct WorkflowConfigUpdate {
    #[validate(length(min = 1, message = "at least one stage is required"))]
    pub stages: Vec<WorkflowStageUpdate>,
}

fn validate_unique_stage_keys(update: &WorkflowConfigUpdate) -> Result<(), ValidationError> {
    let mut seen = Vec::with_capacity(update.stages.len());
    for stage in &update.stages {
        if seen.contains(&stage.key) {
            return Err(ValidationError::new("duplicate_stage"));
        }
        seen.push(stage.key);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Number,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub id: String,
    pub key: String,
    pub label: String,
    pub group: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: Option<u32>,
    pub is_custom: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfigList {
    #[serde(default)]
    pub items: Vec<FieldConfig>,
}

/// A new custom contract column.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_select_options"))]
pub struct FieldConfigCreate {
    #[validate(
        length(min = 2, max = 50, message = "key must be 2 to 50 characters"),
        custom(function = "validate_field_key")
    )]
    pub key: String,
    #[validate(length(min = 1, message = "a label is required"))]
    pub label: String,
    #[validate(length(min = 1, message = "a group is required"))]
    pub group: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 60, max = 600))]
    pub width: Option<u32>,
    pub editable: bool,
    pub required: bool,
    pub fixed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 2000))]
    pub order_index: Option<u32>,
    pub is_custom: bool,
}

impl FieldConfigCreate {
    pub fn new(key: impl Into<String>, label: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            group: group.into(),
            field_type: FieldType::Text,
            width: None,
            editable: true,
            required: false,
            fixed: false,
            options: None,
            description: None,
            order_index: None,
            is_custom: true,
        }
    }
}

/// Keys start with a letter, then letters, digits or underscores.
fn validate_field_key(key: &str) -> Result<(), ValidationError> {
    let mut chars = key.chars();
    let leads_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if leads_with_letter && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }
    Err(ValidationError::new("field_key"))
}

fn validate_select_options(field: &FieldConfigCreate) -> Result<(), ValidationError> {
    let has_options = field.options.as_ref().is_some_and(|o| !o.is_empty());
    if field.field_type == FieldType::Select && !has_options {
        return Err(ValidationError::new("select_needs_options"));
    }
    Ok(())
}

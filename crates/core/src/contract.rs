//! Contract ledger records and queries.

use serde::{Deserialize, Serialize};

/// Approval state recorded on the contract itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractApprovalStatus {
    Pending,
    InProgress,
    Approved,
    Returned,
}

/// A teacher contract row.
///
/// Ledger columns the client reasons about are typed; the remaining
/// personnel fields ride along in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    #[serde(default)]
    pub teacher_code: String,
    #[serde(default)]
    pub department: String,
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub job_status: String,
    #[serde(default)]
    pub approval_status: Option<ContractApprovalStatus>,
    #[serde(default)]
    pub approval_completed_at: Option<String>,
    #[serde(default)]
    pub contract_start: Option<String>,
    #[serde(default)]
    pub contract_end: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub ocr_confidence: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Filter for `/contracts` and `/contracts/export`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ContractQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// `None` or `Some("all")` disables the filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiring_within_days: Option<u32>,
}

impl ContractQuery {
    /// Flatten into query pairs. Repeated `ids` become repeated keys.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |k: &str, v: Option<String>| {
            if let Some(v) = v {
                pairs.push((k.to_string(), v));
            }
        };
        push("page", self.page.map(|v| v.to_string()));
        push("page_size", self.page_size.map(|v| v.to_string()));
        push("department", self.department.clone());
        push("job_status", self.job_status.clone());
        push("search", self.search.clone());
        push("approval_status", self.approval_status.clone());
        push(
            "expiring_within_days",
            self.expiring_within_days.map(|v| v.to_string()),
        );
        for id in &self.ids {
            pairs.push(("ids".to_string(), id.clone()));
        }
        pairs
    }

    pub fn cache_params(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportContractsResponse {
    pub imported: u64,
    pub created: u64,
    pub updated: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// OCR extraction result for an uploaded contract scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub contract: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub confidence: std::collections::HashMap<String, f64>,
    #[serde(default)]
    pub raw_text: String,
}

impl OcrResult {
    /// Fields whose confidence is below `threshold`, sorted by name.
    pub fn low_confidence_fields(&self, threshold: f64) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .confidence
            .iter()
            .filter(|(_, c)| **c < threshold)
            .map(|(f, _)| f.as_str())
            .collect();
        fields.sort_unstable();
        fields
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarSummary {
    pub pending_review: u64,
    pub probation_teachers: u64,
    pub expiring_within30_days: u64,
    pub expiring_within90_days: u64,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_teachers: u64,
    pub active_contracts: u64,
    pub expiring_soon: u64,
    pub pending_review: u64,
    pub average_confidence: f64,
    #[serde(default)]
    pub breakdown: serde_json::Value,
    #[serde(default)]
    pub sidebar_summary: Option<SidebarSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAttachment {
    pub id: String,
    pub name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: String,
    #[serde(default)]
    pub uploader: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractLogItem {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub operator: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractLifecycleDetail {
    pub contract: Contract,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub attachments: Vec<ContractAttachment>,
    #[serde(default)]
    pub logs: Vec<ContractLogItem>,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

//! Approval workflow endpoints.

use desk_core::{
    ApprovalActionPayload, ApprovalActionResponse, ApprovalHistoryRecord, ApprovalStageSummary,
    ApprovalStatsOverview, ApprovalTask, ApprovalTaskList, ApprovalTaskQuery, DeleteAllTasksResponse,
    DeleteTaskResponse, Error, GroupedApproval, Result, ReturnPayload, SendReminderResponse,
    SubjectKey,
};
use tracing::info;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

const WORKFLOW_FAMILIES: [&str; 3] = [
    families::APPROVAL_TASKS,
    families::APPROVAL_OVERVIEW,
    families::APPROVAL_STAGE_SUMMARY,
];

const REMINDER_FAMILIES: [&str; 2] = [families::NOTIFICATIONS, families::UNREAD_COUNT];

/// Who a reminder goes to. Empty fields are left off the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderTarget {
    pub contract_id: Option<String>,
    pub teacher_name: Option<String>,
    pub department: Option<String>,
}

impl ReminderTarget {
    pub fn for_group(group: &GroupedApproval) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            contract_id: non_empty(&group.contract_id),
            teacher_name: non_empty(&group.teacher_name),
            department: non_empty(&group.department),
        }
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        [
            ("contract_id", &self.contract_id),
            ("teacher_name", &self.teacher_name),
            ("department", &self.department),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
        .collect()
    }
}

pub fn history_key(task_id: &str) -> QueryKey {
    QueryKey::new(families::APPROVAL_HISTORY, task_id)
}

#[derive(Clone)]
pub struct ApprovalService {
    client: ApiClient,
    cache: QueryCache,
}

impl ApprovalService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Page through approval tasks. Requires the audit permission; without
    /// it no request is made.
    pub async fn list_tasks(&self, query: &ApprovalTaskQuery) -> Result<ApprovalTaskList> {
        if !self.client.store().can_audit() {
            return Err(Error::permission_denied("approval tasks require contracts.audit"));
        }
        let key = QueryKey::new(families::APPROVAL_TASKS, query.cache_params());
        let request = ApiRequest::get("/approvals/tasks").query_struct(query)?;
        self.cache.get_or_fetch(key, self.client.fetch(request)).await
    }

    /// Same as `list_tasks` but bypasses cached data.
    pub async fn reload_tasks(&self, query: &ApprovalTaskQuery) -> Result<ApprovalTaskList> {
        if !self.client.store().can_audit() {
            return Err(Error::permission_denied("approval tasks require contracts.audit"));
        }
        let key = QueryKey::new(families::APPROVAL_TASKS, query.cache_params());
        let request = ApiRequest::get("/approvals/tasks").query_struct(query)?;
        self.cache.fetch_and_store(key, self.client.fetch(request)).await
    }

    pub async fn overview(&self) -> Result<ApprovalStatsOverview> {
        self.cache
            .get_or_fetch(
                QueryKey::family(families::APPROVAL_OVERVIEW),
                self.client.fetch(ApiRequest::get("/approvals/stats/overview")),
            )
            .await
    }

    pub async fn stage_summary(&self) -> Result<Vec<ApprovalStageSummary>> {
        self.cache
            .get_or_fetch(
                QueryKey::family(families::APPROVAL_STAGE_SUMMARY),
                self.client.fetch(ApiRequest::get("/approvals/stats/stages")),
            )
            .await
    }

    pub async fn history(&self, task_id: &str) -> Result<Vec<ApprovalHistoryRecord>> {
        require_id(task_id)?;
        let request = ApiRequest::get(format!("/approvals/tasks/{}/history", task_id));
        self.cache
            .get_or_fetch(history_key(task_id), self.client.fetch(request))
            .await
    }

    /// Approve an open task with an optional comment.
    pub async fn approve(&self, task: &ApprovalTask, comment: Option<&str>) -> Result<ApprovalTask> {
        require_open(task)?;
        let payload = ApprovalActionPayload {
            comment: comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        };
        let request = ApiRequest::post(format!("/approvals/tasks/{}/approve", task.id)).json(&payload)?;
        let response: ApprovalActionResponse = self.client.fetch(request).await?;
        self.invalidate_after_action(&task.id).await;
        info!(task_id = %task.id, stage = task.stage.as_str(), "Approval task approved");
        Ok(response.task)
    }

    /// Return an open task to its owner. The comment is mandatory and is
    /// checked before anything is sent.
    pub async fn return_task(&self, task: &ApprovalTask, comment: &str) -> Result<ApprovalTask> {
        let payload = ReturnPayload::new(comment)?;
        require_open(task)?;
        let request = ApiRequest::post(format!("/approvals/tasks/{}/return", task.id)).json(&payload)?;
        let response: ApprovalActionResponse = self.client.fetch(request).await?;
        self.invalidate_after_action(&task.id).await;
        info!(task_id = %task.id, stage = task.stage.as_str(), "Approval task returned");
        Ok(response.task)
    }

    pub async fn delete(&self, task_id: &str) -> Result<DeleteTaskResponse> {
        require_id(task_id)?;
        let response = self
            .client
            .fetch(ApiRequest::delete(format!("/approvals/tasks/{}", task_id)))
            .await?;
        self.invalidate_after_action(task_id).await;
        Ok(response)
    }

    /// Delete every task of a subject. Superusers only.
    pub async fn delete_all(&self, subject: &SubjectKey) -> Result<DeleteAllTasksResponse> {
        if !self.client.store().is_superuser() {
            return Err(Error::permission_denied("only superusers may delete all tasks"));
        }
        let request = match subject {
            SubjectKey::Contract(contract_id) if !contract_id.is_empty() => {
                ApiRequest::delete(format!("/approvals/tasks/batch/by-contract/{}", contract_id))
            }
            SubjectKey::Contract(_) => return Err(Error::validation("contract id is required")),
            SubjectKey::Teacher { name, department } => {
                if name.is_empty() || department.is_empty() {
                    return Err(Error::validation(
                        "teacher name and department are both required",
                    ));
                }
                ApiRequest::delete("/approvals/tasks/batch/by-teacher")
                    .query("teacher_name", name.clone())
                    .query("department", department.clone())
            }
        };
        let response: DeleteAllTasksResponse = self.client.fetch(request).await?;
        self.cache.invalidate_families(&WORKFLOW_FAMILIES).await;
        self.cache.invalidate_family(families::APPROVAL_HISTORY).await;
        info!(deleted = response.deleted_count, "Approval tasks deleted for subject");
        Ok(response)
    }

    /// Nudge the owners of a subject's open tasks.
    pub async fn send_reminder(&self, target: &ReminderTarget) -> Result<SendReminderResponse> {
        let pairs = target.query_pairs();
        if pairs.is_empty() {
            return Err(Error::validation("a reminder needs a contract or a teacher"));
        }
        let request = ApiRequest::post("/approvals/tasks/send-reminder").query_pairs(pairs);
        let response: SendReminderResponse = self.client.fetch(request).await?;
        self.cache.invalidate_families(&REMINDER_FAMILIES).await;
        info!(sent = response.notification_count, "Approval reminder sent");
        Ok(response)
    }

    async fn invalidate_after_action(&self, task_id: &str) {
        self.cache.invalidate_families(&WORKFLOW_FAMILIES).await;
        self.cache.invalidate(&history_key(task_id)).await;
    }
}

fn require_id(task_id: &str) -> Result<()> {
    if task_id.trim().is_empty() {
        return Err(Error::validation("task id is required"));
    }
    Ok(())
}

fn require_open(task: &ApprovalTask) -> Result<()> {
    if !task.status.is_open() {
        return Err(Error::validation(format!(
            "task {} is {} and can no longer be acted on",
            task.id,
            task.status.as_str()
        )));
    }
    Ok(())
}

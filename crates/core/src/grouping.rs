//! Per-subject rollup of approval tasks.
//!
//! A flat task list becomes one [`GroupedApproval`] per subject
//! (contract, or teacher name when no contract is linked). The transform is
//! pure: same tasks and same user always give the same groups.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::approval::{ApprovalPriority, ApprovalStatus, ApprovalTask};

/// Derived status of a whole subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    InProgress,
    Completed,
    Returned,
}

/// How a subject is addressed by batch endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubjectKey {
    Contract(String),
    Teacher { name: String, department: String },
}

impl SubjectKey {
    /// Whether `task` groups under this subject.
    pub fn matches(&self, task: &ApprovalTask) -> bool {
        match self {
            Self::Contract(id) => task.contract_id == *id,
            Self::Teacher { name, .. } => task.contract_id.is_empty() && task.teacher_name == *name,
        }
    }
}

/// One row of the approval dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedApproval {
    pub teacher_name: String,
    pub department: String,
    pub contract_id: String,
    pub tasks: Vec<ApprovalTask>,
    pub total_stages: usize,
    pub completed_stages: usize,
    pub pending_stages: usize,
    pub returned_stages: usize,
    pub highest_priority: ApprovalPriority,
    pub earliest_due_date: String,
    pub overall_status: OverallStatus,
    /// Whether the current user may act on at least one open stage.
    pub has_operable_task: bool,
}

impl GroupedApproval {
    fn seed(task: &ApprovalTask) -> Self {
        Self {
            teacher_name: task.teacher_name.clone(),
            department: task.department.clone(),
            contract_id: task.contract_id.clone(),
            tasks: Vec::new(),
            total_stages: 0,
            completed_stages: 0,
            pending_stages: 0,
            returned_stages: 0,
            highest_priority: task.priority,
            earliest_due_date: task.due_date.clone(),
            overall_status: OverallStatus::Pending,
            has_operable_task: false,
        }
    }

    fn fold(&mut self, task: &ApprovalTask, user_identifier: &str) {
        self.total_stages += 1;

        if task.status.is_open() && can_user_operate_task(task, user_identifier) {
            self.has_operable_task = true;
        }

        match task.status {
            ApprovalStatus::Completed => self.completed_stages += 1,
            ApprovalStatus::Returned => self.returned_stages += 1,
            ApprovalStatus::Pending => self.pending_stages += 1,
            ApprovalStatus::InProgress => {}
        }

        if task.priority > self.highest_priority {
            self.highest_priority = task.priority;
        }

        if due_date_before(&task.due_date, &self.earliest_due_date) {
            self.earliest_due_date = task.due_date.clone();
        }

        self.tasks.push(task.clone());
    }

    fn finish(&mut self) {
        self.overall_status = if self.returned_stages > 0 {
            OverallStatus::Returned
        } else if self.completed_stages == self.total_stages {
            OverallStatus::Completed
        } else if self.completed_stages > 0
            || self.tasks.iter().any(|t| t.status == ApprovalStatus::InProgress)
        {
            OverallStatus::InProgress
        } else {
            OverallStatus::Pending
        };
    }

    /// Address used by batch delete and reminders.
    pub fn subject(&self) -> SubjectKey {
        if self.contract_id.is_empty() {
            SubjectKey::Teacher {
                name: self.teacher_name.clone(),
                department: self.department.clone(),
            }
        } else {
            SubjectKey::Contract(self.contract_id.clone())
        }
    }

    /// Whether a task id belongs to this group.
    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }

    /// Tasks in pipeline order.
    pub fn tasks_by_stage(&self) -> Vec<&ApprovalTask> {
        let mut tasks: Vec<&ApprovalTask> = self.tasks.iter().collect();
        tasks.sort_by_key(|t| t.stage);
        tasks
    }

    /// Completion ratio in percent, rounded down.
    pub fn progress_percent(&self) -> u8 {
        if self.total_stages == 0 {
            return 0;
        }
        ((self.completed_stages * 100) / self.total_stages) as u8
    }
}

/// Grouping key: contract id when present, else teacher name.
pub fn group_key(task: &ApprovalTask) -> &str {
    if task.contract_id.is_empty() {
        &task.teacher_name
    } else {
        &task.contract_id
    }
}

/// Client-side gate for approve/return buttons.
///
/// The server re-checks on the action endpoints; this only hides actions
/// the user obviously cannot take.
pub fn can_user_operate_task(task: &ApprovalTask, user_identifier: &str) -> bool {
    if user_identifier.is_empty() {
        return false;
    }
    task.owner == user_identifier || task.assignees.iter().any(|a| a == user_identifier)
}

/// Fold a task list into one row per subject, in first-seen order.
pub fn group_tasks(tasks: &[ApprovalTask], user_identifier: &str) -> Vec<GroupedApproval> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<GroupedApproval> = Vec::new();

    for task in tasks {
        let slot = *index.entry(group_key(task)).or_insert_with(|| {
            groups.push(GroupedApproval::seed(task));
            groups.len() - 1
        });
        groups[slot].fold(task, user_identifier);
    }

    for group in &mut groups {
        group.finish();
    }
    groups
}

/// Parse the backend's date or datetime strings onto a UTC timeline.
///
/// Values with an offset are converted to UTC. Offset-less datetimes and
/// bare dates are taken as UTC already, which is how the backend stores
/// them, so both forms compare on the same axis.
fn parse_due(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Whether `candidate` is strictly earlier than `current`.
///
/// An unparseable candidate never wins; a parseable one always beats an
/// unparseable current value.
fn due_date_before(candidate: &str, current: &str) -> bool {
    match (parse_due(candidate), parse_due(current)) {
        (Some(c), Some(cur)) => c < cur,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Caches the last grouping and recomputes only when the task list
/// identity or the user changes.
#[derive(Debug, Default)]
pub struct GroupingMemo {
    last: Option<(Arc<Vec<ApprovalTask>>, String, Arc<Vec<GroupedApproval>>)>,
}

impl GroupingMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        tasks: &Arc<Vec<ApprovalTask>>,
        user_identifier: &str,
    ) -> Arc<Vec<GroupedApproval>> {
        if let Some((cached_tasks, cached_user, groups)) = &self.last {
            if Arc::ptr_eq(cached_tasks, tasks) && cached_user == user_identifier {
                return groups.clone();
            }
        }
        let groups = Arc::new(group_tasks(tasks, user_identifier));
        self.last = Some((tasks.clone(), user_identifier.to_string(), groups.clone()));
        groups
    }
}

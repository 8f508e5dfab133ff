//! Approval board: the state behind the approvals screen.
//!
//! Holds the current query, the fetched page (guarded against superseded
//! responses), the grouped view, the open subject, the task whose history
//! is shown, and the task with an action in flight.

use desk_core::{
    can_user_operate_task, ApprovalHistoryRecord, ApprovalTask, ApprovalTaskQuery,
    DeleteAllTasksResponse, Error, GroupedApproval, GroupingMemo, Result, SendReminderResponse,
    StageFilter, StatusFilter, SubjectKey,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::LatestSlot;
use crate::hooks::{Notice, Notifier};
use crate::services::approvals::{ApprovalService, ReminderTarget};

pub const NOTICE_APPROVED: &str = "Approval granted";
pub const NOTICE_RETURNED: &str = "Return submitted";
pub const NOTICE_TASK_DELETED: &str = "Approval task deleted";
pub const NOTICE_REMINDER_FAILED: &str = "Failed to send reminder";

struct BoardState {
    query: ApprovalTaskQuery,
    total: u64,
    open_subject: Option<SubjectKey>,
    history_task: Option<String>,
    busy_task: Option<String>,
}

pub struct ApprovalBoard {
    service: ApprovalService,
    notifier: Arc<dyn Notifier>,
    state: Mutex<BoardState>,
    tasks: LatestSlot<Arc<Vec<ApprovalTask>>>,
    memo: Mutex<GroupingMemo>,
    empty: Arc<Vec<ApprovalTask>>,
}

/// Clears the busy marker when the action settles.
struct BusyGuard<'a> {
    board: &'a ApprovalBoard,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.board.state.lock().busy_task = None;
    }
}

impl ApprovalBoard {
    pub fn new(service: ApprovalService, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            service,
            notifier,
            state: Mutex::new(BoardState {
                query: ApprovalTaskQuery::default(),
                total: 0,
                open_subject: None,
                history_task: None,
                busy_task: None,
            }),
            tasks: LatestSlot::new(),
            memo: Mutex::new(GroupingMemo::new()),
            empty: Arc::new(Vec::new()),
        }
    }

    pub fn query(&self) -> ApprovalTaskQuery {
        self.state.lock().query.clone()
    }

    /// Change filters; paging restarts at the first page.
    pub fn set_filters(&self, status: StatusFilter, stage: StageFilter) {
        let mut state = self.state.lock();
        let keyword = state.query.keyword.clone();
        let mut query = ApprovalTaskQuery::new(status, stage, 1, state.query.page_size);
        query.keyword = keyword;
        state.query = query;
    }

    pub fn set_keyword(&self, keyword: Option<String>) {
        let mut state = self.state.lock();
        state.query.keyword = keyword.filter(|k| !k.trim().is_empty());
        state.query.page = 1;
    }

    pub fn set_page(&self, page: u32, page_size: u32) {
        let mut state = self.state.lock();
        state.query.page = page.max(1);
        state.query.page_size = page_size.max(1);
    }

    fn user_identifier(&self) -> String {
        self.service.client().store().user_identifier()
    }

    /// Fetch the current page and regroup it.
    ///
    /// Without the audit permission nothing is fetched and the board is
    /// empty. A response overtaken by a newer load is dropped.
    pub async fn load(&self) -> Result<Arc<Vec<GroupedApproval>>> {
        if !self.service.client().store().can_audit() {
            debug!("No audit permission, approval board stays empty");
            self.tasks.clear();
            self.state.lock().total = 0;
            return Ok(self.groups());
        }

        let ticket = self.tasks.issue();
        let query = self.query();
        let page = self.service.list_tasks(&query).await?;
        let total = page.total;
        if self.tasks.accept(ticket, Arc::new(page.data)) {
            self.state.lock().total = total;
        }
        Ok(self.groups())
    }

    /// Tasks of the last accepted page.
    pub fn tasks(&self) -> Arc<Vec<ApprovalTask>> {
        self.tasks.get().unwrap_or_else(|| self.empty.clone())
    }

    /// Grouped view of the current page, recomputed only when the page or
    /// the user changes.
    pub fn groups(&self) -> Arc<Vec<GroupedApproval>> {
        let tasks = self.tasks();
        let user = self.user_identifier();
        self.memo.lock().get(&tasks, &user)
    }

    pub fn total(&self) -> u64 {
        self.state.lock().total
    }

    /// Whether the current user may act on `task` right now.
    pub fn can_operate(&self, task: &ApprovalTask) -> bool {
        task.status.is_open() && can_user_operate_task(task, &self.user_identifier())
    }

    pub fn open_subject(&self, subject: SubjectKey) {
        self.state.lock().open_subject = Some(subject);
    }

    pub fn close_subject(&self) {
        self.state.lock().open_subject = None;
    }

    pub fn opened_subject(&self) -> Option<SubjectKey> {
        self.state.lock().open_subject.clone()
    }

    /// The group behind the open subject, if it is on the current page.
    pub fn open_group(&self) -> Option<GroupedApproval> {
        let subject = self.opened_subject()?;
        self.groups().iter().find(|g| g.subject() == subject).cloned()
    }

    pub fn view_history(&self, task_id: impl Into<String>) {
        self.state.lock().history_task = Some(task_id.into());
    }

    pub fn history_task(&self) -> Option<String> {
        self.state.lock().history_task.clone()
    }

    /// History of the selected task; empty when none is selected.
    pub async fn history(&self) -> Result<Vec<ApprovalHistoryRecord>> {
        match self.history_task() {
            Some(task_id) => self.service.history(&task_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Task id with an action in flight.
    pub fn busy_task(&self) -> Option<String> {
        self.state.lock().busy_task.clone()
    }

    fn mark_busy(&self, task_id: &str) -> BusyGuard<'_> {
        self.state.lock().busy_task = Some(task_id.to_string());
        BusyGuard { board: self }
    }

    fn require_operable(&self, task: &ApprovalTask) -> Result<()> {
        if !can_user_operate_task(task, &self.user_identifier()) {
            return Err(Error::permission_denied(format!(
                "not an owner or assignee of task {}",
                task.id
            )));
        }
        Ok(())
    }

    pub async fn approve(&self, task: &ApprovalTask, comment: Option<&str>) -> Result<ApprovalTask> {
        self.require_operable(task)?;
        let _busy = self.mark_busy(&task.id);
        let updated = self.service.approve(task, comment).await?;
        self.notifier.notify(Notice::success(NOTICE_APPROVED));
        self.reload_after_action().await;
        Ok(updated)
    }

    pub async fn return_task(&self, task: &ApprovalTask, comment: &str) -> Result<ApprovalTask> {
        self.require_operable(task)?;
        let _busy = self.mark_busy(&task.id);
        let updated = self.service.return_task(task, comment).await?;
        self.notifier.notify(Notice::success(NOTICE_RETURNED));
        self.reload_after_action().await;
        Ok(updated)
    }

    pub async fn delete(&self, task: &ApprovalTask) -> Result<()> {
        if !self.service.client().store().is_superuser() {
            self.require_operable(task)?;
        }
        let _busy = self.mark_busy(&task.id);
        self.service.delete(&task.id).await?;
        {
            let mut state = self.state.lock();
            if state.history_task.as_deref() == Some(task.id.as_str()) {
                state.history_task = None;
            }
            if state.open_subject.as_ref().is_some_and(|s| s.matches(task)) {
                state.open_subject = None;
            }
        }
        self.notifier.notify(Notice::success(NOTICE_TASK_DELETED));
        self.reload_after_action().await;
        Ok(())
    }

    /// Delete every task of `group`'s subject.
    pub async fn delete_all(&self, group: &GroupedApproval) -> Result<DeleteAllTasksResponse> {
        let subject = group.subject();
        let response = self.service.delete_all(&subject).await?;
        {
            let mut state = self.state.lock();
            if state.open_subject.as_ref() == Some(&subject) {
                state.open_subject = None;
            }
            if state
                .history_task
                .as_deref()
                .is_some_and(|id| group.contains_task(id))
            {
                state.history_task = None;
            }
        }
        self.notifier.notify(Notice::success(format!(
            "Deleted {} approval tasks",
            response.deleted_count
        )));
        self.reload_after_action().await;
        Ok(response)
    }

    /// Remind the owners of `group`'s open tasks.
    pub async fn send_reminder(&self, group: &GroupedApproval) -> Result<SendReminderResponse> {
        match self.service.send_reminder(&ReminderTarget::for_group(group)).await {
            Ok(response) => {
                self.notifier.notify(Notice::success(response.summary()));
                Ok(response)
            }
            Err(e) => {
                let message = match &e {
                    Error::Validation(msg) => msg.clone(),
                    other => other.detail().unwrap_or(NOTICE_REMINDER_FAILED).to_string(),
                };
                self.notifier.notify(Notice::warning(message));
                Err(e)
            }
        }
    }

    async fn reload_after_action(&self) {
        if let Err(e) = self.load().await {
            warn!(error = %e, "Failed to reload approval tasks after action");
        }
    }
}

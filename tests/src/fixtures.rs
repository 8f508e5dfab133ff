//! Test fixtures and payload generators.

use chrono::{Duration, Utc};
use desk_core::limits::AUDIT_PERMISSION;
use desk_core::{AuthUser, MeResponse, TokenResponse};
use serde_json::{json, Value};

/// Display name of the signed-in test user; approval ownership matches on it.
pub const USER_NAME: &str = "Zhang Min";

pub const ACCESS_TOKEN: &str = "access-1";
pub const REFRESHED_ACCESS_TOKEN: &str = "access-2";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Opaque token pair; the client falls back to `expires_in` for expiry.
pub fn tokens(access: &str, refresh: Option<&str>) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        token_type: "bearer".to_string(),
        expires_in: 1800,
        refresh_token: refresh.map(str::to_string),
    }
}

pub fn token_json(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 1800,
        "refresh_token": refresh,
    })
}

pub fn user(is_superuser: bool) -> AuthUser {
    AuthUser {
        id: "u-1".to_string(),
        username: "hr01".to_string(),
        full_name: Some(USER_NAME.to_string()),
        is_superuser,
        ..AuthUser::default()
    }
}

/// An HR auditor with the approval permission.
pub fn auditor() -> MeResponse {
    MeResponse {
        user: user(false),
        permissions: vec![AUDIT_PERMISSION.to_string()],
    }
}

pub fn superuser() -> MeResponse {
    MeResponse {
        user: user(true),
        permissions: vec!["*".to_string()],
    }
}

/// A signed-in user without any approval access.
pub fn clerk() -> MeResponse {
    MeResponse {
        user: user(false),
        permissions: vec!["contracts.read".to_string()],
    }
}

pub fn me_json(me: &MeResponse) -> Value {
    serde_json::to_value(me).unwrap()
}

/// Date `days` from today, formatted the way the backend sends due dates.
pub fn due_in(days: i64) -> String {
    (Utc::now() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// One approval task row.
pub fn task(
    id: &str,
    contract_id: Option<&str>,
    teacher: &str,
    stage: &str,
    status: &str,
    owner: &str,
) -> Value {
    json!({
        "id": id,
        "contract_id": contract_id,
        "teacher_name": teacher,
        "department": "Mathematics",
        "stage": stage,
        "status": status,
        "priority": "medium",
        "owner": owner,
        "assignees": [],
        "due_date": due_in(7),
    })
}

/// A page of tasks in the list envelope.
pub fn task_page(tasks: Vec<Value>, page: u32) -> Value {
    let total = tasks.len();
    json!({
        "data": tasks,
        "total": total,
        "page": page,
        "page_size": 10,
        "total_pages": 1,
    })
}

/// Mixed page: a contract with three stages, a returned contract, and a
/// teacher without a contract yet.
pub fn board_tasks() -> Vec<Value> {
    let mut high = task("t-3", Some("c-1"), "Li Wei", "probation", "in_progress", "Wang Fang");
    high["priority"] = json!("high");
    high["due_date"] = json!(due_in(2));

    vec![
        task("t-1", Some("c-1"), "Li Wei", "entry", "completed", USER_NAME),
        task("t-2", Some("c-1"), "Li Wei", "qualification", "pending", USER_NAME),
        high,
        task("t-4", Some("c-2"), "Chen Jing", "signature", "returned", "Wang Fang"),
        task("t-5", None, "Zhao Lei", "entry", "pending", "Wang Fang"),
        task("t-6", None, "Zhao Lei", "qualification", "pending", "Wang Fang"),
    ]
}

/// Response of the approve/return endpoints.
pub fn action_response(task: Value, status: &str) -> Value {
    let mut task = task;
    task["status"] = json!(status);
    json!({ "task": task })
}

pub fn unread_json(count: u64) -> Value {
    json!({ "unread_count": count })
}

pub fn notification_list(total: u64, unread: u64) -> Value {
    let items: Vec<Value> = (0..total)
        .map(|i| {
            json!({
                "id": format!("n-{}", i),
                "user_id": "u-1",
                "type": "approval_reminder",
                "title": "Approval pending",
                "is_read": i >= unread,
                "created_at": "2026-10-01T09:00:00",
            })
        })
        .collect();
    json!({ "total": total, "unread_count": unread, "items": items })
}

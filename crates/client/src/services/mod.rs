//! Endpoint services, one per API area.

pub mod announcements;
pub mod approvals;
pub mod auth;
pub mod contracts;
pub mod profile;
pub mod settings;
pub mod users;

pub use announcements::AnnouncementService;
pub use approvals::{ApprovalService, ReminderTarget};
pub use auth::AuthService;
pub use contracts::ContractService;
pub use profile::ProfileService;
pub use settings::SettingsService;
pub use users::UserAdmin;

//! Session-aware REST client for the contract desk.
//!
//! The pieces, bottom-up:
//! - [`transport`]: the HTTP seam and its reqwest implementation
//! - [`store`]: session state and persistence
//! - [`refresh`] and [`api`]: single-flight refresh and the intercepting client
//! - [`idle`] and [`guard`]: inactivity timeout and route guarding
//! - [`cache`]: server-state cache with family invalidation
//! - [`services`] and [`board`]: endpoint services and the approval board

pub mod api;
pub mod board;
pub mod cache;
pub mod config;
pub mod guard;
pub mod hooks;
pub mod idle;
pub mod refresh;
pub mod services;
pub mod state;
pub mod store;
pub mod transport;

pub use api::{ApiClient, RequestRoute};
pub use board::ApprovalBoard;
pub use cache::{families, LatestSlot, QueryCache, QueryKey};
pub use config::{ClientConfig, SessionPolicy};
pub use guard::{AuthGuard, GuardDecision};
pub use hooks::{
    LoginRedirect, Navigator, Notice, NoticeLevel, Notifier, RedirectReason, TracingNavigator,
    TracingNotifier,
};
pub use idle::{ActivityKind, IdleVerdict, IdleWatchdog};
pub use refresh::{RefreshCoordinator, RefreshLease, RefreshTicket};
pub use services::{
    AnnouncementService, ApprovalService, AuthService, ContractService, ProfileService,
    ReminderTarget, SettingsService, UserAdmin,
};
pub use state::{Desk, DeskBuilder};
pub use store::{FileStorage, MemoryStorage, SessionStorage, SessionStore};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, RequestBody, Transport};

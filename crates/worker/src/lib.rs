//! Background workers for the contract desk.
//!
//! - Idle check (session inactivity timeout)
//! - Unread notification count poller
//! - Notification list poller
//! - Periodic metrics snapshot logging

pub mod feed;
pub mod scheduler;

pub use feed::NotificationFeed;
pub use scheduler::*;

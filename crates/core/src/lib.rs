//! Core types, error taxonomy, and approval aggregation for the contract desk.

pub mod announcement;
pub mod approval;
pub mod auth;
pub mod clock;
pub mod contract;
pub mod error;
pub mod grouping;
pub mod limits;
pub mod page;
pub mod profile;
pub mod session;
pub mod settings;
pub mod user;

pub use announcement::*;
pub use approval::*;
pub use auth::*;
pub use clock::*;
pub use contract::*;
pub use error::{Error, ErrorClass, Result, SessionEnd};
pub use grouping::*;
pub use page::*;
pub use profile::*;
pub use session::*;
pub use settings::*;
pub use user::*;

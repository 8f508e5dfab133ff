//! Shared harness for the contract desk integration tests.

pub mod fixtures;
pub mod mocks;
pub mod setup;

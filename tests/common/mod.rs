//! Shared infrastructure for end-to-end mirror tests
//!
//! - A Debian repository served by httpmock
//! - A temporary mirror root with a ready-made configuration

#![allow(dead_code)]

pub mod repo_simulation;
pub mod test_helpers;

pub use repo_simulation::{MockRepository, PublishedRepository, TestPackage, LAST_MODIFIED};
pub use test_helpers::{RunOutcome, TestEnvironment};

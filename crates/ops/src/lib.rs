#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level orchestration for aptsync
//!
//! This crate serves as the orchestration layer between the CLI and the
//! specialised crates. It plans downloads from resolved artifacts, runs
//! them on a bounded pool, and drives a whole mirror run through its
//! states from crash recovery to cleaning.

mod context;
mod engine;
mod executor;
mod planner;

pub use context::{OpsContextBuilder, OpsCtx};
pub use engine::{RunMode, SyncEngine};
pub use executor::{DownloadExecutor, Estimate, ExecutionSummary, TaskOutcome};
pub use planner::{DownloadPlan, DownloadPlanner};

use aptsync_errors::Error;
use aptsync_types::SyncReport;

/// Mirror every configured repository
///
/// # Errors
///
/// Returns an error if no repository is configured or the mirror root is
/// not writable. Failures of single entries or files are in the report.
pub async fn sync(ctx: &OpsCtx) -> Result<SyncReport, Error> {
    SyncEngine::new(ctx, RunMode::Sync).run().await
}

/// Remove files no current index references, without downloading
///
/// # Errors
///
/// Returns an error if no repository is configured or the mirror root is
/// not writable.
pub async fn clean(ctx: &OpsCtx) -> Result<SyncReport, Error> {
    SyncEngine::new(ctx, RunMode::CleanOnly).run().await
}

/// Render a report as pretty JSON
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn report_to_json(report: &SyncReport) -> Result<String, Error> {
    serde_json::to_string_pretty(report).map_err(|e| Error::internal(e.to_string()))
}

#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the aptsync mirror engine
//!
//! This crate holds the data model shared by the resolver, planner,
//! executor and cleaner: repository entries, index descriptors, artifacts,
//! download tasks and the aggregated sync report.

pub mod artifact;
pub mod format;
pub mod index;
pub mod reports;
pub mod repository;
pub mod state;

pub use artifact::{Artifact, DownloadDecision, DownloadTask, FetchReason, LocalFileState};
pub use format::{format_size, parse_rate};
pub use index::{IndexDescriptor, IndexKind};
pub use reports::{
    EntryFailure, FailureReason, IntegrityConflict, SyncReport, TaskFailure,
};
pub use repository::{sanitise_uri, EntryId, RepositoryEntry, SourceKind};
pub use state::SyncState;

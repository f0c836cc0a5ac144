//! Integration tests grouped by the part of a run they exercise

pub mod clean;
pub mod recovery;
pub mod sync;

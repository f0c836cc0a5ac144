#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Local mirror storage for aptsync
//!
//! This crate owns the on-disk side of a mirror: the `mirror/`, `skel/`
//! and `var/` directory layout, snapshots of already-mirrored files,
//! publishing staged index files, and removing files that no current
//! index references.

mod cleaner;
mod layout;
mod promote;
mod state;

pub use cleaner::{CleanReport, Cleaner};
pub use layout::MirrorLayout;
pub use promote::{promote_indexes, PromoteSummary};
pub use state::{local_state, scan_local_state};

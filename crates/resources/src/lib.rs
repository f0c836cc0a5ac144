#![deny(clippy::pedantic, unsafe_code)]

//! Concurrency pools for aptsync
//!
//! Network transfers and index decompression run on separate bounded pools
//! so a slow decompression never holds a download slot. Both pools share one
//! cancellation token.

pub mod limits;
pub mod manager;

pub use limits::{ResourceAvailability, ResourceLimits};
pub use manager::ResourceManager;
pub use tokio_util::sync::CancellationToken;

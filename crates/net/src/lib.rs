#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for aptsync
//!
//! This crate provides the `Fetcher` capability (one conditional transfer of
//! one URL to one destination), its reqwest-backed implementation with proxy,
//! TLS, retry and a shared rate cap, and the lock tracker that marks
//! destinations while they are being written.

mod client;
mod fetcher;
mod http;
mod lock;
mod retry;
mod throttle;
mod validation;

pub use client::{NetClient, NetConfig, ProxyConfig};
pub use fetcher::{FetchMode, FetchOutcome, FetchRequest, Fetcher};
pub use http::{http_date, parse_http_date, partial_path, HttpFetcher, PARTIAL_SUFFIX};
pub use lock::{fetch_guarded, LockToken, LockTracker, MARKER_EXTENSION};
pub use retry::{calculate_backoff_delay, is_transient, RetryConfig};
pub use throttle::RateLimiter;

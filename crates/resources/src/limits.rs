//! Pool sizes for one engine run

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Concurrent transfers, the `threads` setting
    pub concurrent_downloads: usize,
    /// Concurrent index decompressions
    pub concurrent_decompressions: usize,
}

impl ResourceLimits {
    /// Each pool gets at least one slot
    #[must_use]
    pub fn new(concurrent_downloads: usize, concurrent_decompressions: usize) -> Self {
        Self {
            concurrent_downloads: concurrent_downloads.max(1),
            concurrent_decompressions: concurrent_decompressions.max(1),
        }
    }

    #[must_use]
    pub fn for_testing() -> Self {
        Self::new(2, 1)
    }
}

impl Default for ResourceLimits {
    /// One transfer and one decompression per available core
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(4);
        Self::new(cores, cores)
    }
}

/// Free slots at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAvailability {
    pub download: usize,
    pub decompression: usize,
}

impl ResourceAvailability {
    /// Nothing is holding a permit
    #[must_use]
    pub fn is_idle(&self, limits: &ResourceLimits) -> bool {
        self.download >= limits.concurrent_downloads
            && self.decompression >= limits.concurrent_decompressions
    }
}

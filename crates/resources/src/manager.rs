//! Shared pools and cancellation for one engine run

use aptsync_errors::{Error, OpsError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{ResourceAvailability, ResourceLimits};

/// Owns the download and decompression semaphores and the stop signal
#[derive(Debug, Clone)]
pub struct ResourceManager {
    limits: ResourceLimits,
    downloads: Arc<Semaphore>,
    decompressions: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl ResourceManager {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            downloads: Arc::new(Semaphore::new(limits.concurrent_downloads)),
            decompressions: Arc::new(Semaphore::new(limits.concurrent_decompressions)),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Wait for a transfer slot
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the stop signal fires while waiting.
    pub async fn acquire_download_permit(&self) -> Result<OwnedSemaphorePermit, Error> {
        self.acquire(&self.downloads, "download").await
    }

    /// Wait for a decompression slot
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the stop signal fires while waiting.
    pub async fn acquire_decompression_permit(&self) -> Result<OwnedSemaphorePermit, Error> {
        self.acquire(&self.decompressions, "decompression").await
    }

    async fn acquire(
        &self,
        semaphore: &Arc<Semaphore>,
        operation: &str,
    ) -> Result<OwnedSemaphorePermit, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            permit = semaphore.clone().acquire_owned() => permit.map_err(|_| {
                OpsError::WorkerFailed {
                    message: format!("{operation} pool closed"),
                }
                .into()
            }),
        }
    }

    /// Stop accepting new work
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token for callers that want to observe or trigger the stop signal
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn availability(&self) -> ResourceAvailability {
        ResourceAvailability {
            download: self.downloads.available_permits(),
            decompression: self.decompressions.available_permits(),
        }
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(ResourceLimits::default())
    }
}

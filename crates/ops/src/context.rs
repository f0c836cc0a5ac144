//! Operations context for dependency injection

use aptsync_config::MirrorConfig;
use aptsync_errors::{Error, OpsError};
use aptsync_events::{EventEmitter, EventSender};
use aptsync_net::{Fetcher, HttpFetcher, LockTracker, NetConfig};
use aptsync_resources::{ResourceLimits, ResourceManager};
use aptsync_store::MirrorLayout;
use std::sync::Arc;

/// Operations context providing access to all engine components
pub struct OpsCtx {
    /// Settings and repository entries
    pub config: MirrorConfig,
    /// Mirror, staging and working directories
    pub layout: MirrorLayout,
    /// Transfer capability shared by index and artifact downloads
    pub fetcher: Arc<dyn Fetcher>,
    /// Crash-witness markers
    pub locks: Arc<LockTracker>,
    /// Worker pools and the stop signal
    pub resources: Arc<ResourceManager>,
    /// Event sender for progress reporting
    pub tx: EventSender,
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl OpsCtx {
    // No public constructor - use OpsContextBuilder instead

    /// Ask a running engine to stop accepting work
    pub fn cancel(&self) {
        self.resources.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.resources.is_cancelled()
    }
}

/// Builder for operations context
///
/// Only the configuration and the event sender are required; the layout,
/// pools, lock tracker and HTTP fetcher are derived from the settings when
/// not supplied.
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<MirrorConfig>,
    layout: Option<MirrorLayout>,
    fetcher: Option<Arc<dyn Fetcher>>,
    resources: Option<Arc<ResourceManager>>,
    tx: Option<EventSender>,
}

impl OpsContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: MirrorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the directory layout
    #[must_use]
    pub fn with_layout(mut self, layout: MirrorLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Use a custom fetcher instead of the HTTP one
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share an existing resource manager
    #[must_use]
    pub fn with_resources(mut self, resources: Arc<ResourceManager>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or event sender is missing, or
    /// the HTTP client cannot be created.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let config = self.config.ok_or_else(|| OpsError::MissingComponent {
            component: "config".to_string(),
        })?;

        let tx = self.tx.ok_or_else(|| OpsError::MissingComponent {
            component: "event_sender".to_string(),
        })?;

        let settings = &config.settings;
        let layout = self
            .layout
            .unwrap_or_else(|| MirrorLayout::from_settings(settings));

        let resources = self.resources.unwrap_or_else(|| {
            Arc::new(ResourceManager::new(ResourceLimits::new(
                settings.threads,
                settings.decompress_threads,
            )))
        });

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => {
                let fetcher = HttpFetcher::from_config(NetConfig::from_settings(settings))?
                    .with_event_sender(tx.clone());
                Arc::new(fetcher)
            }
        };

        let locks = LockTracker::new(layout.lock_dir());

        Ok(OpsCtx {
            config,
            layout,
            fetcher,
            locks,
            resources,
            tx,
        })
    }
}

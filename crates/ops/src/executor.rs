//! Bounded-parallel execution of download tasks

use aptsync_errors::Error;
use aptsync_events::{AppEvent, DownloadEvent, EventEmitter, EventSender, FailureContext};
use aptsync_net::{fetch_guarded, FetchMode, FetchOutcome, FetchRequest, Fetcher, LockTracker};
use aptsync_resources::{CancellationToken, ResourceManager};
use aptsync_store::MirrorLayout;
use aptsync_types::{DownloadTask, FailureReason, SyncReport, TaskFailure};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Result of one task, sent back to the collecting loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Downloaded { bytes: u64 },
    Unchanged,
    Failed(TaskFailure),
    /// Stopped before or during the transfer
    Cancelled,
}

/// Totals of one executor batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub downloaded: usize,
    pub unchanged: usize,
    pub bytes: u64,
    pub failures: Vec<TaskFailure>,
    pub cancelled: usize,
}

impl ExecutionSummary {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            TaskOutcome::Unchanged => self.unchanged += 1,
            TaskOutcome::Failed(failure) => self.failures.push(failure),
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Add these totals to a run report
    pub fn fold_into(self, report: &mut SyncReport) {
        report.files_downloaded += self.downloaded;
        report.files_skipped += self.unchanged;
        report.bytes_downloaded += self.bytes;
        report.files_cancelled += self.cancelled;
        report.failures.extend(self.failures);
    }
}

/// Size-only estimate of a plan, for dry runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Estimate {
    pub files: usize,
    pub bytes: u64,
}

/// Runs download tasks on a bounded pool.
///
/// Every task holds a lock marker for its destination while the fetcher
/// runs. A failed task releases its marker and is retried on the next run
/// only. After a stop signal no new task starts; in-flight transfers are
/// abandoned with their markers left in place.
pub struct DownloadExecutor {
    fetcher: Arc<dyn Fetcher>,
    locks: Arc<LockTracker>,
    resources: Arc<ResourceManager>,
    layout: MirrorLayout,
    concurrency: usize,
    events: Option<EventSender>,
}

impl EventEmitter for DownloadExecutor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

struct Worker {
    fetcher: Arc<dyn Fetcher>,
    locks: Arc<LockTracker>,
    resources: Arc<ResourceManager>,
    cancel: CancellationToken,
    events: Option<EventSender>,
}

impl EventEmitter for Worker {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl DownloadExecutor {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        locks: Arc<LockTracker>,
        resources: Arc<ResourceManager>,
        layout: MirrorLayout,
    ) -> Self {
        let concurrency = resources.limits().concurrent_downloads;
        Self {
            fetcher,
            locks,
            resources,
            layout,
            concurrency,
            events: None,
        }
    }

    /// Cap the number of tasks in flight; never above the download pool
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, self.resources.limits().concurrent_downloads);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// What `run` would transfer, without any I/O
    #[must_use]
    pub fn estimate(tasks: &[DownloadTask]) -> Estimate {
        tasks
            .iter()
            .filter(|t| t.decision.is_fetch())
            .fold(Estimate::default(), |acc, t| Estimate {
                files: acc.files + 1,
                bytes: acc.bytes + t.artifact.size,
            })
    }

    /// Execute every task and collect the outcomes.
    ///
    /// Completion order is unspecified; only the returned totals are.
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> ExecutionSummary {
        let estimate = Self::estimate(&tasks);
        self.emit(AppEvent::Download(DownloadEvent::BatchStarted {
            tasks: tasks.len(),
            to_fetch: estimate.files,
            planned_bytes: estimate.bytes,
            concurrency: self.concurrency,
        }));

        let worker = Arc::new(Worker {
            fetcher: Arc::clone(&self.fetcher),
            locks: Arc::clone(&self.locks),
            resources: Arc::clone(&self.resources),
            cancel: self.resources.cancellation_token(),
            events: self.events.clone(),
        });

        let mut summary = ExecutionSummary::default();
        let mut in_flight: HashMap<tokio::task::Id, (String, String)> = HashMap::new();
        let mut join_set = JoinSet::new();
        let mut pending = tasks.into_iter();

        loop {
            while join_set.len() < self.concurrency && !worker.cancel.is_cancelled() {
                let Some(task) = pending.next() else {
                    break;
                };
                let identity = (task.artifact.rel_path.clone(), task.artifact.url.clone());
                let dest = self.layout.mirror_path(&task.artifact.rel_path);
                let worker = Arc::clone(&worker);
                let handle = join_set.spawn(async move { worker.execute(task, dest).await });
                in_flight.insert(handle.id(), identity);
            }

            // Single collection point for every outcome
            match join_set.join_next_with_id().await {
                Some(Ok((id, outcome))) => {
                    in_flight.remove(&id);
                    summary.record(outcome);
                }
                Some(Err(join_error)) => {
                    if let Some((rel_path, url)) = in_flight.remove(&join_error.id()) {
                        summary.record(TaskOutcome::Failed(TaskFailure {
                            rel_path,
                            url,
                            reason: FailureReason::Storage {
                                message: join_error.to_string(),
                            },
                        }));
                    }
                }
                None => break,
            }
        }

        // Never started because of a stop signal
        summary.cancelled += pending.count();

        self.emit(AppEvent::Download(DownloadEvent::BatchCompleted {
            downloaded: summary.downloaded,
            unchanged: summary.unchanged,
            failed: summary.failures.len(),
            cancelled: summary.cancelled,
            bytes: summary.bytes,
        }));
        summary
    }
}

impl Worker {
    async fn execute(&self, task: DownloadTask, dest: PathBuf) -> TaskOutcome {
        let Ok(_permit) = self.resources.acquire_download_permit().await else {
            return TaskOutcome::Cancelled;
        };

        let artifact = task.artifact;
        let mode = if task.decision.is_fetch() {
            FetchMode::Unconditional
        } else {
            FetchMode::Conditional
        };
        let request = FetchRequest::new(&artifact.url, dest)
            .with_size(Some(artifact.size))
            .with_checksums(artifact.checksums)
            .with_mode(mode);

        self.emit(AppEvent::Download(DownloadEvent::Started {
            url: artifact.url.clone(),
            rel_path: artifact.rel_path.clone(),
            expected_size: Some(artifact.size),
            conditional: request.is_conditional(),
        }));
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.emit(AppEvent::Download(DownloadEvent::Abandoned {
                    url: artifact.url,
                    rel_path: artifact.rel_path,
                }));
                return TaskOutcome::Cancelled;
            }
            result = fetch_guarded(self.fetcher.as_ref(), &self.locks, &request) => result,
        };

        match result {
            Ok(FetchOutcome::Downloaded { bytes }) => {
                self.emit(AppEvent::Download(DownloadEvent::Completed {
                    url: artifact.url,
                    rel_path: artifact.rel_path,
                    bytes,
                    elapsed: started.elapsed(),
                }));
                TaskOutcome::Downloaded { bytes }
            }
            Ok(FetchOutcome::Unchanged) => {
                self.emit(AppEvent::Download(DownloadEvent::Unchanged {
                    url: artifact.url,
                    rel_path: artifact.rel_path,
                }));
                TaskOutcome::Unchanged
            }
            Err(Error::Cancelled) => TaskOutcome::Cancelled,
            Err(err) => {
                self.emit(AppEvent::Download(DownloadEvent::Failed {
                    url: artifact.url.clone(),
                    rel_path: artifact.rel_path.clone(),
                    failure: FailureContext::from_error(&err),
                }));
                TaskOutcome::Failed(TaskFailure {
                    rel_path: artifact.rel_path,
                    url: artifact.url,
                    reason: FailureReason::from(&err),
                })
            }
        }
    }
}

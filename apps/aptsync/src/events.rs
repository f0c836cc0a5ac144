//! Event handling and progress display

use aptsync_events::{AppEvent, CleanEvent, DownloadEvent, EngineEvent, LockEvent, RepoEvent};
use aptsync_types::format_size;
use console::{style, Term};

use crate::logging::{describe, log_event_with_tracing};

/// Turns engine events into log records and terminal progress lines
pub struct EventHandler {
    term: Term,
    colors: bool,
    /// Per-file lines are suppressed; phase lines still print
    quiet_files: bool,
    /// Nothing but logs; stdout carries the JSON report
    silent: bool,
    downloaded: usize,
    planned: usize,
}

impl EventHandler {
    pub fn new(colors: bool, show_progress: bool, json: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors,
            quiet_files: !show_progress,
            silent: json,
            downloaded: 0,
            planned: 0,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        log_event_with_tracing(&event);
        if self.silent {
            return;
        }

        match &event {
            AppEvent::Engine(EngineEvent::PlanReady { to_fetch, .. }) => {
                self.planned = *to_fetch;
                self.show_status(&describe(&event));
            }
            AppEvent::Engine(EngineEvent::StateChanged { .. }) => {}
            AppEvent::Engine(EngineEvent::StopRequested) => self.show_warning(&describe(&event)),
            AppEvent::Engine(_) | AppEvent::Lock(LockEvent::ScanCompleted { .. }) => {
                self.show_status(&describe(&event));
            }

            AppEvent::Repo(RepoEvent::Resolved { .. }) => self.show_status(&describe(&event)),
            AppEvent::Repo(RepoEvent::Unreachable { .. }) => self.show_error(&describe(&event)),
            AppEvent::Repo(RepoEvent::StanzaSkipped { .. } | RepoEvent::ReleaseLineSkipped { .. })
            | AppEvent::Lock(LockEvent::Recovered { .. }) => self.show_warning(&describe(&event)),
            AppEvent::Repo(_) => {}

            AppEvent::Download(DownloadEvent::Completed { rel_path, bytes, .. }) => {
                self.downloaded += 1;
                if !self.quiet_files {
                    self.show_status(&format!(
                        "[{}/{}] {rel_path} ({})",
                        self.downloaded,
                        self.planned,
                        format_size(*bytes)
                    ));
                }
            }
            AppEvent::Download(DownloadEvent::Failed { .. }) => self.show_error(&describe(&event)),
            AppEvent::Download(DownloadEvent::Retrying { .. }) => {
                if !self.quiet_files {
                    self.show_warning(&describe(&event));
                }
            }
            AppEvent::Download(DownloadEvent::BatchStarted { .. } | DownloadEvent::BatchCompleted { .. }) => {
                self.show_status(&describe(&event));
            }
            AppEvent::Download(_) => {}

            AppEvent::Clean(CleanEvent::Removed { .. }) => {
                if !self.quiet_files {
                    self.show_status(&describe(&event));
                }
            }
            AppEvent::Clean(CleanEvent::Skipped { .. }) => self.show_warning(&describe(&event)),
            AppEvent::Clean(CleanEvent::Completed { .. }) => self.show_status(&describe(&event)),
            AppEvent::Clean(_) => {}

            AppEvent::General(_) => match event.log_level() {
                tracing::Level::ERROR => self.show_error(&describe(&event)),
                tracing::Level::WARN => self.show_warning(&describe(&event)),
                _ => {}
            },
        }
    }

    fn show_status(&self, message: &str) {
        let _ = self.term.write_line(message);
    }

    fn show_warning(&self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("warning:").yellow().bold())
        } else {
            format!("warning: {message}")
        };
        let _ = self.term.write_line(&line);
    }

    fn show_error(&self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("error:").red().bold())
        } else {
            format!("error: {message}")
        };
        let _ = self.term.write_line(&line);
    }
}

//! Tracing setup and structured logging of engine events
//!
//! Every `AppEvent` is forwarded to `tracing` at the level the event itself
//! declares. The payload is attached as a JSON field so the log file carries
//! the full event, while the message stays short enough for a terminal.

use aptsync_config::LogLevel;
use aptsync_events::{
    AppEvent, CleanEvent, DownloadEvent, EngineEvent, GeneralEvent, LockEvent, RepoEvent,
};
use aptsync_types::format_size;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// How the subscriber should be assembled
pub struct LogOptions<'a> {
    /// Verbosity from the mirror list; `RUST_LOG` wins when set
    pub level: LogLevel,
    /// Use the JSON formatter on stderr
    pub json: bool,
    /// Also write JSON lines to a timestamped file in this directory
    pub log_dir: Option<&'a Path>,
}

/// Install the global subscriber. Returns the log file path when one was opened.
pub fn init_tracing(options: &LogOptions<'_>) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.level)));

    let console = if options.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file_layer, log_path) = match options.log_dir.map(open_log_file) {
        Some(Ok((file, path))) => (
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            ),
            Some(path),
        ),
        Some(Err(e)) => {
            eprintln!("Warning: Failed to create log file: {e}");
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    log_path
}

fn default_directive(level: LogLevel) -> String {
    format!("warn,aptsync={}", level.as_filter())
}

fn open_log_file(dir: &Path) -> std::io::Result<(std::fs::File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "aptsync-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    let file = std::fs::File::create(&path)?;
    Ok((file, path))
}

macro_rules! log_at {
    ($level:expr, $($args:tt)+) => {
        match $level {
            Level::ERROR => error!($($args)+),
            Level::WARN => warn!($($args)+),
            Level::INFO => info!($($args)+),
            Level::DEBUG => debug!($($args)+),
            _ => trace!($($args)+),
        }
    };
}

/// Log an `AppEvent` with its domain and full payload as structured fields
pub fn log_event_with_tracing(event: &AppEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    let message = describe(event);
    log_at!(
        event.log_level(),
        domain = event.log_target(),
        event = %payload,
        "{message}"
    );
}

/// One-line summary of an event
pub fn describe(event: &AppEvent) -> String {
    match event {
        AppEvent::General(event) => describe_general(event),
        AppEvent::Engine(event) => describe_engine(event),
        AppEvent::Repo(event) => describe_repo(event),
        AppEvent::Download(event) => describe_download(event),
        AppEvent::Lock(event) => describe_lock(event),
        AppEvent::Clean(event) => describe_clean(event),
    }
}

fn describe_general(event: &GeneralEvent) -> String {
    match event {
        GeneralEvent::Warning { message, context } => match context {
            Some(context) => format!("{message} ({context})"),
            None => message.clone(),
        },
        GeneralEvent::Error { message } | GeneralEvent::Debug { message } => message.clone(),
    }
}

fn describe_engine(event: &EngineEvent) -> String {
    match event {
        EngineEvent::Started {
            entries,
            dry_run,
            clean_only,
        } => {
            let mode = match (clean_only, dry_run) {
                (true, true) => "clean-only dry run",
                (true, false) => "clean-only run",
                (false, true) => "dry run",
                (false, false) => "sync",
            };
            format!("Starting {mode} of {entries} repository entries")
        }
        EngineEvent::StateChanged { from, to } => format!("{from:?} -> {to:?}"),
        EngineEvent::PlanReady {
            tasks,
            to_fetch,
            to_skip,
            planned_bytes,
            conflicts,
        } => format!(
            "Planned {tasks} files: {to_fetch} to fetch ({}), {to_skip} present, {conflicts} conflicts",
            format_size(*planned_bytes)
        ),
        EngineEvent::IndexesPromoted { files } => format!("Published {files} index files"),
        EngineEvent::StopRequested => "Stop requested; abandoning in-flight transfers".to_string(),
        EngineEvent::Finished {
            state,
            bytes_downloaded,
            files_failed,
            duration,
        } => format!(
            "Finished in state {state:?}: {} downloaded, {files_failed} failed, {:.1}s",
            format_size(*bytes_downloaded),
            duration.as_secs_f64()
        ),
    }
}

fn describe_repo(event: &RepoEvent) -> String {
    match event {
        RepoEvent::ResolveStarted { entry, description } => {
            format!("Resolving entry {entry}: {description}")
        }
        RepoEvent::ReleaseParsed {
            path,
            files_listed,
            by_hash,
            ..
        } => format!("Parsed {path}: {files_listed} files listed (by-hash: {by_hash})"),
        RepoEvent::IndexesSelected { entry, count } => {
            format!("Entry {entry}: {count} index files selected")
        }
        RepoEvent::ReleaseLineSkipped { path, line } => {
            format!("Skipped malformed line in {path}: {line}")
        }
        RepoEvent::StanzaSkipped { path, line, reason } => {
            format!("Skipped stanza at {path}:{line}: {reason}")
        }
        RepoEvent::Decompressed {
            path,
            plain,
            reused,
        } => {
            if *reused {
                format!("Reused {plain}")
            } else {
                format!("Decompressed {path} to {plain}")
            }
        }
        RepoEvent::Resolved {
            entry,
            index_files,
            artifacts,
        } => format!("Entry {entry}: {index_files} index files, {artifacts} artifacts"),
        RepoEvent::Unreachable {
            entry,
            description,
            failure,
        } => format!(
            "Entry {entry} ({description}) skipped: {}",
            failure.message
        ),
    }
}

fn describe_download(event: &DownloadEvent) -> String {
    match event {
        DownloadEvent::BatchStarted {
            tasks,
            to_fetch,
            planned_bytes,
            concurrency,
        } => format!(
            "Downloading {to_fetch} of {tasks} files ({}) with {concurrency} workers",
            format_size(*planned_bytes)
        ),
        DownloadEvent::Started { url, .. } => format!("GET {url}"),
        DownloadEvent::Completed { url, bytes, .. } => {
            format!("Got {url} ({})", format_size(*bytes))
        }
        DownloadEvent::Unchanged { url, .. } => format!("Unchanged {url}"),
        DownloadEvent::Failed { url, failure, .. } => {
            format!("Failed {url}: {}", failure.message)
        }
        DownloadEvent::Retrying {
            url,
            attempt,
            max_attempts,
            reason,
            backoff_delay,
        } => format!(
            "Retrying {url} ({attempt}/{max_attempts}) in {}ms: {reason}",
            backoff_delay.as_millis()
        ),
        DownloadEvent::Abandoned { url, .. } => format!("Abandoned {url}"),
        DownloadEvent::BatchCompleted {
            downloaded,
            unchanged,
            failed,
            cancelled,
            bytes,
        } => format!(
            "Downloads done: {downloaded} fetched ({}), {unchanged} unchanged, {failed} failed, {cancelled} cancelled",
            format_size(*bytes)
        ),
    }
}

fn describe_lock(event: &LockEvent) -> String {
    match event {
        LockEvent::Recovered {
            marker,
            destination,
            ..
        } => match destination {
            Some(dest) => format!("Recovered interrupted download of {}", dest.display()),
            None => format!("Removed unreadable marker {}", marker.display()),
        },
        LockEvent::ScanCompleted { markers, purged } => {
            format!("Lock scan: {markers} markers, {purged} partial files purged")
        }
    }
}

fn describe_clean(event: &CleanEvent) -> String {
    match event {
        CleanEvent::Started { root, dry_run } => {
            let verb = if *dry_run { "Checking" } else { "Cleaning" };
            format!("{verb} {}", root.display())
        }
        CleanEvent::Removed {
            path,
            bytes,
            dry_run,
        } => {
            let verb = if *dry_run { "Would remove" } else { "Removed" };
            format!("{verb} {} ({})", path.display(), format_size(*bytes))
        }
        CleanEvent::DirectoryRemoved { path } => format!("Removed directory {}", path.display()),
        CleanEvent::Skipped { root, reason } => {
            format!("Not cleaning {}: {reason}", root.display())
        }
        CleanEvent::Completed {
            root,
            files,
            bytes,
            dry_run,
        } => {
            let verb = if *dry_run { "would free" } else { "freed" };
            format!(
                "{}: {files} files, {verb} {}",
                root.display(),
                format_size(*bytes)
            )
        }
    }
}

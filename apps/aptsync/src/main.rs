//! aptsync - mirror APT repositories to a local directory tree
//!
//! This is the CLI front end. It loads the mirror list, prepares the
//! directory layout and hands a run to the ops crate, rendering its events
//! and final report.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod setup;

use crate::cli::{Cli, Commands};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use crate::logging::LogOptions;
use crate::setup::SystemSetup;
use aptsync_config::{LogLevel, MirrorConfig};
use aptsync_events::EventReceiver;
use aptsync_ops::{OpsContextBuilder, OpsCtx};
use aptsync_types::SyncReport;
use clap::Parser;
use std::process;
use tokio::select;
use tracing::{error, info, warn};

/// Exit status when the run finished but something did not sync
const EXIT_INCOMPLETE: i32 = 1;
/// Exit status when the run could not start
const EXIT_FATAL: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_INCOMPLETE),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(EXIT_FATAL);
        }
    }
}

/// Main application logic; `Ok(false)` means the report is not a success
async fn run(cli: Cli) -> Result<bool, CliError> {
    if let Some(Commands::Init { path }) = &cli.command {
        logging::init_tracing(&LogOptions {
            level: LogLevel::default(),
            json: cli.global.json,
            log_dir: None,
        });
        let written = SystemSetup::write_default_config(path.as_deref()).await?;
        if !cli.global.json {
            println!("Wrote {}", written.display());
        }
        return Ok(true);
    }

    // Precedence: mirror list, then environment, then flags
    let mut config = MirrorConfig::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli)?;

    let log_dir = config.settings.var_dir();
    let log_path = logging::init_tracing(&LogOptions {
        level: config.settings.log_level,
        json: cli.global.json,
        log_dir: cli.global.log_file.then_some(log_dir.as_path()),
    });
    info!("Starting aptsync v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &log_path {
        info!(path = %path.display(), "logging to file");
    }

    let setup = SystemSetup::new(&config);
    setup.initialize().await?;

    let (event_sender, event_receiver) = aptsync_events::channel();
    let ctx = OpsContextBuilder::new()
        .with_config(config.clone())
        .with_layout(setup.layout().clone())
        .with_event_sender(event_sender)
        .build()?;

    let stop = ctx.resources.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            stop.cancel();
        }
    });

    let colors = cli.global.color.unwrap_or_default().enabled();
    let show_progress = !(cli.global.no_progress || config.settings.disable_progress);
    let mut event_handler = EventHandler::new(colors, show_progress, cli.global.json);

    let report = execute_with_events(&ctx, cli.clean_only(), event_receiver, &mut event_handler)
        .await?;

    OutputRenderer::new(cli.global.json, colors).render_report(&report)?;

    let success = report.is_success();
    info!(success, state = ?report.state, "Run completed");
    Ok(success)
}

/// Run the engine while draining its events
async fn execute_with_events(
    ctx: &OpsCtx,
    clean_only: bool,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<SyncReport, CliError> {
    let mut run = Box::pin(async move {
        if clean_only {
            aptsync_ops::clean(ctx).await
        } else {
            aptsync_ops::sync(ctx).await
        }
    });

    loop {
        select! {
            result = &mut run => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            Some(event) = event_receiver.recv() => event_handler.handle_event(event),
        }
    }
}

/// Apply CLI overrides (highest precedence)
fn apply_cli_config(config: &mut MirrorConfig, cli: &Cli) -> Result<(), CliError> {
    let global = &cli.global;
    if global.test {
        config.settings.test = true;
    }
    if global.force {
        config.settings.force_update = true;
    }
    if let Some(threads) = global.threads {
        if threads == 0 {
            return Err(CliError::InvalidArguments(
                "--threads must be at least 1".to_string(),
            ));
        }
        config.settings.threads = threads;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["aptsync", "--test", "--force", "--threads", "3"]);
        let mut config = MirrorConfig::default();
        apply_cli_config(&mut config, &cli).unwrap();
        assert!(config.settings.test);
        assert!(config.settings.force_update);
        assert_eq!(config.settings.threads, 3);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let cli = Cli::parse_from(["aptsync", "--threads", "0"]);
        let mut config = MirrorConfig::default();
        assert!(matches!(
            apply_cli_config(&mut config, &cli),
            Err(CliError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let cli = Cli::parse_from(["aptsync"]);
        let mut config = MirrorConfig::default();
        config.settings.test = true;
        config.settings.threads = 7;
        apply_cli_config(&mut config, &cli).unwrap();
        assert!(config.settings.test);
        assert_eq!(config.settings.threads, 7);
    }
}

//! Command line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// aptsync - mirror APT repositories to a local directory tree
#[derive(Parser)]
#[command(name = "aptsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror APT repositories to a local directory tree")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Arguments shared by every command
#[derive(Parser)]
pub struct GlobalArgs {
    /// Mirror list to read (default: ~/aptsync/aptsync.conf)
    #[arg(long = "conf", global = true, value_name = "PATH", env = "APTSYNC_CONF")]
    pub config: Option<PathBuf>,

    /// Dry run: resolve and plan, report sizes, change nothing in the mirror
    #[arg(long, global = true)]
    pub test: bool,

    /// Only remove files no index references; download nothing
    #[arg(long, global = true)]
    pub clean: bool,

    /// Download workers
    #[arg(long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Re-download files that already have the declared size
    #[arg(long, global = true)]
    pub force: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write JSON logs to <var>/aptsync-<timestamp>.log
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Suppress per-file progress lines
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Mirror every configured repository (default)
    Sync,

    /// Remove obsolete files without downloading
    Clean,

    /// Write a commented default mirror list
    Init {
        /// Where to write it (default: ~/aptsync/aptsync.conf)
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

impl ColorChoice {
    /// Resolve `Auto` against the terminal
    pub fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().features().colors_supported(),
        }
    }
}

impl Cli {
    /// Whether this invocation runs in clean-only mode
    pub fn clean_only(&self) -> bool {
        self.global.clean || matches!(self.command, Some(Commands::Clean))
    }
}

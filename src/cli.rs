use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{DeploymentMode, ProtocolChoice};

/// Jadwal - generate monthly schedules with the Jadwal engine
#[derive(Parser, Debug)]
#[command(name = "jadwal")]
#[command(about = "Locate, launch and supervise the Jadwal schedule engine")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: resolve everything and print the engine command
    /// without starting it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Deployment layout to probe (defaults to $JADWAL_DEPLOYMENT, then the build profile)
    #[arg(long, global = true)]
    pub mode: Option<DeploymentMode>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a schedule workbook
    Generate {
        /// Month (1-12)
        #[arg(short, long)]
        month: String,
        /// Year
        #[arg(short, long)]
        year: String,
        /// Single day of the month (1-31)
        #[arg(short, long)]
        day: Option<String>,
        /// Extra parameter passed to the wrapper script (default 3)
        #[arg(short, long)]
        extra: Option<String>,
        /// Engine protocol to look for
        #[arg(short, long, default_value = "auto")]
        protocol: ProtocolChoice,
        /// Workbook to bootstrap from if no bundled copy exists
        #[arg(long)]
        data_file: Option<PathBuf>,
        /// Open the output folder when done
        #[arg(long)]
        reveal: bool,
    },
    /// Show or change engine settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Open the output folder (or the folder containing PATH)
    Reveal {
        path: Option<PathBuf>,
    },
    /// Choose a folder with the system dialog and print it
    PickFolder,
    /// Choose a file with the system dialog and print it
    PickFile {
        /// Allowed extensions, e.g. --ext xlsx --ext xls
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Report where the engine, data, settings and output are looked for
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,
    /// Update settings; unspecified fields keep their current value
    Set {
        #[arg(long)]
        verbose: Option<bool>,
        /// Output directory ("" to clear)
        #[arg(long)]
        outdir: Option<PathBuf>,
        /// Template workbook name
        #[arg(long)]
        template: Option<String>,
        /// Master data workbook override ("" to clear)
        #[arg(long)]
        master: Option<PathBuf>,
    },
    /// Restore all defaults
    Reset,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

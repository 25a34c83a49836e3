//! Command implementations for the spk CLI.
//!
//! Provides subcommands for locating an event with an external program,
//! recomputing magnitudes, clearing results and exchanging event documents
//! with the remote event store.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod config;
pub mod remote;
pub mod review;
pub mod session;

/// Location program selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Solver {
    #[value(name = "3dloc")]
    ThreeDLoc,
    #[value(name = "hyp2000")]
    Hyp2000,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// TOML configuration of the location programs and the event store
    #[arg(short = 'c', long, global = true, default_value = "spk.toml")]
    pub config: PathBuf,

    /// JSON station manifest of the session
    #[arg(short = 'm', long, global = true, default_value = "stations.json")]
    pub manifest: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Locate the event of an XML document and write the located event
    Locate {
        #[arg(short = 's', long, value_enum)]
        solver: Solver,

        /// Event XML with the manual picks
        #[arg(short = 'e', long)]
        event: PathBuf,

        /// JSON list of amplitude picks for the magnitude; without it the
        /// magnitudes of the previous location are dropped
        #[arg(short = 'a', long)]
        amplitudes: Option<PathBuf>,

        /// Output path (defaults to stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Fetch the next event of a time window from the event store
    Fetch {
        /// Start of the window (ISO-8601)
        #[arg(long)]
        start: String,

        /// End of the window (ISO-8601)
        #[arg(long)]
        end: String,

        /// File keeping the round-robin position between runs
        #[arg(short = 'i', long)]
        index_file: Option<PathBuf>,

        /// Output path (defaults to stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Upload an event XML to the event store
    Upload {
        #[arg(short = 'e', long)]
        event: PathBuf,
    },

    /// Recompute the station and network magnitudes of an event
    Magnitude {
        #[arg(short = 'e', long)]
        event: PathBuf,

        /// JSON list of amplitude picks; without it only the network
        /// magnitude is recomputed from the stored station magnitudes
        #[arg(short = 'a', long)]
        amplitudes: Option<PathBuf>,

        /// Stations to leave out of the network magnitude
        #[arg(short = 'x', long)]
        exclude: Vec<String>,

        /// Output path (defaults to stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Remove location results (and with them all picks) from an event
    Clear {
        #[arg(short = 'e', long)]
        event: PathBuf,

        /// Keep the manual picks, only drop the location and magnitudes
        #[arg(long)]
        keep_picks: bool,

        /// Output path (defaults to overwriting the event)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(global: GlobalArgs, command: Command) -> anyhow::Result<()> {
    let config = config::Config::load(&global.config)?;
    match command {
        Command::Locate {
            solver,
            event,
            amplitudes,
            output,
        } => {
            review::run_locate(
                &config,
                &global.manifest,
                solver,
                &event,
                amplitudes.as_deref(),
                output.as_deref(),
            )
        }
        Command::Fetch {
            start,
            end,
            index_file,
            output,
        } => {
            remote::run_fetch(
                &config,
                &global.manifest,
                &start,
                &end,
                index_file.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Command::Upload { event } => {
            remote::run_upload(&config, &global.manifest, &event).await
        }
        Command::Magnitude {
            event,
            amplitudes,
            exclude,
            output,
        } => {
            review::run_magnitude(
                &global.manifest,
                &event,
                amplitudes.as_deref(),
                &exclude,
                output.as_deref(),
            )
        }
        Command::Clear {
            event,
            keep_picks,
            output,
        } => {
            review::run_clear(&global.manifest, &event, keep_picks, output.as_deref())
        }
    }
}

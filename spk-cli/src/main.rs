//! spk CLI - Command line tool for locating seismic events and exchanging
//! them with an event store.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "spk-cli",
    version,
    about = "Seismic event review toolkit"
)]
struct Cli {
    #[command(flatten)]
    global: spk_cmd::GlobalArgs,

    #[command(subcommand)]
    command: spk_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    spk_cmd::run(cli.global, cli.command).await
}

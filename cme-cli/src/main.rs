//! CME CLI - explore census tract maps and per-tract age breakdowns.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "cme-cli",
    version,
    about = "Census tract choropleth and detail explorer"
)]
struct Cli {
    #[command(subcommand)]
    command: cme_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    cme_cmd::run(cli.command).await
}

//! Command implementations for the census map explorer CLI.
//!
//! `explore` runs a full dashboard session against the live Census API:
//! it loads a region's tract choropleth and then applies clicks one by one.

use clap::Subcommand;
use cme_census::region::Region;
use std::path::PathBuf;

pub mod config;
pub mod explore;

use config::ServiceArgs;

#[derive(Subcommand)]
pub enum Command {
    /// List the selectable regions
    Regions,

    /// Load a region's tract map, then click tracts to chart their age breakdown
    Explore {
        /// Region name, postal abbreviation or FIPS code
        #[arg(short = 'r', long)]
        region: String,

        /// Tract GEOID to click; repeat to click several in order
        #[arg(short = 'c', long = "click")]
        clicks: Vec<String>,

        /// Directory for map.geojson, legend.json and chart.json
        #[arg(short = 'o', long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Print the age breakdown of one tract
    Detail {
        /// Region name, postal abbreviation or FIPS code
        #[arg(short = 'r', long)]
        region: String,

        /// Eleven-digit tract GEOID
        #[arg(short = 't', long)]
        tract: String,

        #[command(flatten)]
        service: ServiceArgs,
    },
}

fn list_regions() {
    for region in Region::get_region_vector() {
        println!("{}  {}  {}", region.fips, region.abbr, region.name);
    }
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Regions => {
            list_regions();
            Ok(())
        }
        Command::Explore {
            region,
            clicks,
            out_dir,
            service,
        } => explore::run_explore(&service, &region, &clicks, out_dir.as_deref()).await,
        Command::Detail {
            region,
            tract,
            service,
        } => explore::run_detail(&service, &region, &tract).await,
    }
}

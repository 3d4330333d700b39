//! Terminal and file surfaces, and the `explore` and `detail` commands.

use crate::config::ServiceArgs;
use anyhow::Context;
use cme_census::client::CensusClient;
use cme_census::feature::FeatureId;
use cme_census::fetch::DetailFetcher;
use cme_census::region::Region;
use cme_census::variables::CohortTable;
use cme_render::chart::{self, ChartView};
use cme_render::choropleth::MapLayer;
use cme_session::surface::{ChartSurface, MapSurface, Viewport};
use cme_session::{Dashboard, Event, Notice, Session};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHART_WIDTH: usize = 50;

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Map surface that writes the current layer to `map.geojson` and its legend
/// to `legend.json`.
pub struct FileMapSurface {
    out_dir: Option<PathBuf>,
    viewport: Option<Viewport>,
    replacements: usize,
}

impl FileMapSurface {
    pub fn new(out_dir: Option<&Path>) -> Self {
        FileMapSurface {
            out_dir: out_dir.map(Path::to_path_buf),
            viewport: None,
            replacements: 0,
        }
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    fn write(&self, dir: &Path, layer: &MapLayer) -> anyhow::Result<()> {
        write_json(&dir.join("map.geojson"), &layer.to_geojson())?;
        write_json(&dir.join("legend.json"), &layer.legend)?;
        Ok(())
    }
}

impl MapSurface for FileMapSurface {
    fn replace_layer(&mut self, layer: Option<&MapLayer>) {
        self.replacements += 1;
        let layer = match layer {
            Some(layer) => layer,
            None => {
                debug!("Map layer withdrawn");
                return;
            }
        };
        if self.viewport.is_none() {
            self.viewport = layer.bounds().map(Viewport::fit);
            if let Some(viewport) = self.viewport {
                info!(
                    "Viewport centered on {:.4},{:.4} at zoom {:.1}",
                    viewport.center[0], viewport.center[1], viewport.zoom
                );
            }
        }
        info!("Map layer: {} features for {}", layer.len(), layer.region);
        if let Some(dir) = &self.out_dir {
            if let Err(err) = self.write(dir, layer) {
                warn!("Could not write map layer: {:#}", err);
            }
        }
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

/// Chart surface printing text bars to stdout and notices to stderr.
pub struct TerminalChartSurface {
    out_dir: Option<PathBuf>,
    width: usize,
}

impl TerminalChartSurface {
    pub fn new(out_dir: Option<&Path>, width: usize) -> Self {
        TerminalChartSurface {
            out_dir: out_dir.map(Path::to_path_buf),
            width,
        }
    }
}

impl ChartSurface for TerminalChartSurface {
    fn show(&mut self, view: &ChartView) {
        match view {
            ChartView::Placeholder { message } => info!("{}", message),
            ChartView::Bars(chart) => {
                println!("{}", chart.to_text(self.width));
                if let Some(dir) = &self.out_dir {
                    if let Err(err) = write_json(&dir.join("chart.json"), view) {
                        warn!("Could not write chart: {:#}", err);
                    }
                }
            }
        }
    }

    fn notify(&mut self, notice: &Notice) {
        warn!("{}", notice);
        eprintln!("{}", notice);
    }
}

/// Select `region`, then click each tract in turn, waiting for every fetch.
pub async fn run_explore(
    service: &ServiceArgs,
    region: &str,
    clicks: &[String],
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let region = Region::lookup(region)?;
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let client = CensusClient::new(service.client_config()).context("building Census client")?;
    let session = Session::new(service.session_config())?;
    let mut dashboard = Dashboard::new(
        session,
        Arc::new(client),
        FileMapSurface::new(out_dir),
        TerminalChartSurface::new(out_dir, CHART_WIDTH),
    );

    dashboard.apply(Event::SelectRegion(region.clone()));
    dashboard.settle().await;
    let features = match dashboard.session().dataset() {
        Some(dataset) => dataset.len(),
        None => anyhow::bail!("could not load tracts for {}", region),
    };
    info!("{} tracts loaded for {}", features, region);

    for click in clicks {
        let id = FeatureId::new(click.trim());
        let known = dashboard
            .session()
            .dataset()
            .is_some_and(|dataset| dataset.contains(&id));
        if !known {
            warn!("{} is not a tract of {}; click ignored", id, region);
            continue;
        }
        dashboard.apply(Event::FeatureClick(Some(id)));
        dashboard.settle().await;
    }
    dashboard.apply(Event::Close);
    Ok(())
}

/// Fetch and print the breakdown of a single tract.
pub async fn run_detail(service: &ServiceArgs, region: &str, tract: &str) -> anyhow::Result<()> {
    let region = Region::lookup(region)?;
    let client = CensusClient::new(service.client_config()).context("building Census client")?;
    let fetcher = DetailFetcher::new(CohortTable::age_cohorts(), service.dataset());
    let feature_id = FeatureId::new(tract.trim());
    let detail = fetcher
        .fetch(&client, &region, &feature_id)
        .await
        .with_context(|| format!("fetching detail for {} in {}", feature_id, region))?;
    match chart::render(Some(&detail), &fetcher.cohorts) {
        ChartView::Bars(chart) => println!("{}", chart.to_text(CHART_WIDTH)),
        ChartView::Placeholder { message } => println!("{}", message),
    }
    Ok(())
}

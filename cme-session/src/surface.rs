//! Display surfaces the session renders into.
//!
//! A map surface owns its viewport; replacing the data layer never moves it.

use crate::state::Notice;
use cme_census::feature::Bounds;
use cme_render::chart::ChartView;
use cme_render::choropleth::MapLayer;
use log::warn;

/// Pan/zoom position of a map surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    /// Web-map zoom level; 0 shows the whole world.
    pub zoom: f64,
}

impl Viewport {
    pub const MAX_ZOOM: f64 = 18.0;

    /// Viewport showing `bounds` in a square view.
    pub fn fit(bounds: Bounds) -> Self {
        let center = bounds.center();
        let span = bounds.width().max(bounds.height()).max(f64::EPSILON);
        let zoom = (360.0 / span).log2().clamp(0.0, Viewport::MAX_ZOOM);
        Viewport {
            center: [center.x, center.y],
            zoom,
        }
    }
}

pub trait MapSurface {
    /// Swap the data layer (`None` withdraws it) without touching the viewport.
    fn replace_layer(&mut self, layer: Option<&MapLayer>);

    fn viewport(&self) -> Option<Viewport>;
}

pub trait ChartSurface {
    fn show(&mut self, chart: &ChartView);

    /// Non-fatal notice, e.g. a failed fetch.
    fn notify(&mut self, notice: &Notice) {
        warn!("{}", notice);
    }
}

//! Per-session state machine.
//!
//! A `Session` owns everything one user sees: the region, its dataset and
//! map layer, the selection, its detail dataset and chart. Nothing is shared
//! between sessions. Inputs invalidate their dependents immediately through
//! the dependency graph; remote results are applied only when they carry the
//! current ticket.

use crate::graph::{DependencyGraph, GraphError};
use crate::selection::{ClickOutcome, SelectionTracker};
use crate::ticket::{RequestTracker, Ticket};
use cme_census::error::RemoteFetchError;
use cme_census::feature::{DetailDataset, FeatureDataset, FeatureId};
use cme_census::region::Region;
use cme_census::variables::{CohortTable, DatasetVersion, MetricSpec};
use cme_render::chart::{self, ChartView};
use cme_render::choropleth::{self, MapLayer, MapStyle};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A detail fetch was requested with nothing selected.
    #[error("no feature is selected")]
    EmptySelection,
    #[error("invalid session graph: {0}")]
    Graph(#[from] GraphError),
    #[error("dashboard is no longer running")]
    Closed,
}

/// Derived values of a session, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Region,
    RegionData,
    MapLayer,
    Selection,
    DetailData,
    Chart,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Node::Region => "region",
            Node::RegionData => "region data",
            Node::MapLayer => "map layer",
            Node::Selection => "selection",
            Node::DetailData => "detail data",
            Node::Chart => "chart",
        };
        f.write_str(name)
    }
}

const SESSION_GRAPH: &[(Node, &[Node])] = &[
    (Node::Region, &[]),
    (Node::RegionData, &[Node::Region]),
    (Node::MapLayer, &[Node::RegionData]),
    (Node::Selection, &[Node::Region]),
    (Node::DetailData, &[Node::Region, Node::Selection]),
    (Node::Chart, &[Node::DetailData]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoRegion,
    RegionLoading,
    RegionReady,
    SelectionLoading,
    SelectionReady,
}

impl Phase {
    fn is_settled(&self) -> bool {
        matches!(
            self,
            Phase::NoRegion | Phase::RegionReady | Phase::SelectionReady
        )
    }
}

/// What a session displays and fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub metric: MetricSpec,
    pub cohorts: CohortTable,
    pub style: MapStyle,
    pub dataset: DatasetVersion,
}

/// A non-fatal problem to show next to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub stage: Node,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not load {}: {}", self.stage, self.message)
    }
}

/// Outcome of handing a fetch result to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// The result belonged to a superseded request and was dropped.
    StaleDiscarded,
    /// The fetch failed; the last settled view is displayed again.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRequest {
    pub ticket: Ticket,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub ticket: Ticket,
    pub region: Region,
    pub feature_id: FeatureId,
}

#[derive(Debug, Clone, Default)]
struct View {
    region: Option<Region>,
    features: Option<Arc<FeatureDataset>>,
    layer: Option<Arc<MapLayer>>,
    selection: SelectionTracker,
    detail: Option<Arc<DetailDataset>>,
    chart: ChartView,
}

#[derive(Debug)]
pub struct Session {
    graph: DependencyGraph<Node>,
    config: SessionConfig,
    phase: Phase,
    view: View,
    settled: (Phase, View),
    region_requests: RequestTracker,
    detail_requests: RequestTracker,
    notices: Vec<Notice>,
    changes: Vec<Node>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let graph = DependencyGraph::new(SESSION_GRAPH)?;
        Ok(Session {
            graph,
            config,
            phase: Phase::NoRegion,
            view: View::default(),
            settled: (Phase::NoRegion, View::default()),
            region_requests: RequestTracker::default(),
            detail_requests: RequestTracker::default(),
            notices: Vec::new(),
            changes: Vec::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph<Node> {
        &self.graph
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn region(&self) -> Option<&Region> {
        self.view.region.as_ref()
    }

    pub fn dataset(&self) -> Option<&FeatureDataset> {
        self.view.features.as_deref()
    }

    pub fn layer(&self) -> Option<&MapLayer> {
        self.view.layer.as_deref()
    }

    pub fn selection(&self) -> Option<&FeatureId> {
        self.view.selection.current()
    }

    pub fn detail(&self) -> Option<&DetailDataset> {
        self.view.detail.as_deref()
    }

    pub fn chart(&self) -> &ChartView {
        &self.view.chart
    }

    /// True while a region or detail fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.region_requests.is_pending() || self.detail_requests.is_pending()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Nodes whose displayed value changed since the last call, in the order
    /// they changed.
    pub fn take_changes(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.changes)
    }

    /// Switch to `region`. Everything downstream is cleared at once; the
    /// returned request must be fetched and handed to `complete_region`.
    pub fn select_region(&mut self, region: Region) -> RegionRequest {
        info!("Region selected: {}", region);
        for node in self.graph.affected(Node::Region) {
            self.invalidate(node);
        }
        self.view.region = Some(region.clone());
        self.mark(Node::Region);
        self.phase = Phase::RegionLoading;
        RegionRequest {
            ticket: self.region_requests.issue(),
            region,
        }
    }

    /// Handle a click on the map. Clicks without an id, clicks while no
    /// dataset is displayed and ids outside the displayed dataset are ignored.
    pub fn feature_click(
        &mut self,
        click: Option<FeatureId>,
    ) -> Result<Option<DetailRequest>, SessionError> {
        if let Some(id) = click.as_ref() {
            let displayed = self
                .view
                .features
                .as_ref()
                .is_some_and(|dataset| dataset.contains(id));
            if !displayed {
                debug!("Ignoring click on {} outside the displayed dataset", id);
                return Ok(None);
            }
        }
        match self.view.selection.on_feature_click(click) {
            ClickOutcome::Ignored => Ok(None),
            ClickOutcome::Selected(id) => {
                info!("Feature selected: {}", id);
                self.mark(Node::Selection);
                self.request_detail().map(Some)
            }
        }
    }

    /// Issue a detail fetch for the current selection, superseding any
    /// outstanding one.
    pub fn request_detail(&mut self) -> Result<DetailRequest, SessionError> {
        let feature_id = self
            .view
            .selection
            .current()
            .cloned()
            .ok_or(SessionError::EmptySelection)?;
        let region = self
            .view
            .region
            .clone()
            .ok_or(SessionError::EmptySelection)?;
        for node in self.graph.affected(Node::Selection) {
            self.invalidate(node);
        }
        self.view.chart = ChartView::placeholder(format!(
            "Loading {} for {}",
            self.config.cohorts.title.to_lowercase(),
            feature_id
        ));
        self.phase = Phase::SelectionLoading;
        Ok(DetailRequest {
            ticket: self.detail_requests.issue(),
            region,
            feature_id,
        })
    }

    pub fn complete_region(
        &mut self,
        ticket: Ticket,
        result: Result<FeatureDataset, RemoteFetchError>,
    ) -> Applied {
        if !self.region_requests.resolve(ticket) {
            debug!("Discarding stale region result #{}", ticket.generation());
            return Applied::StaleDiscarded;
        }
        match result {
            Ok(dataset) => {
                self.view.features = Some(Arc::new(dataset));
                self.mark(Node::RegionData);
                for node in self.graph.affected(Node::RegionData) {
                    self.recompute(node);
                }
                self.settle(Phase::RegionReady);
                Applied::Updated
            }
            Err(err) => self.fail(Node::RegionData, err),
        }
    }

    pub fn complete_detail(
        &mut self,
        ticket: Ticket,
        result: Result<DetailDataset, RemoteFetchError>,
    ) -> Applied {
        if !self.detail_requests.resolve(ticket) {
            debug!("Discarding stale detail result #{}", ticket.generation());
            return Applied::StaleDiscarded;
        }
        match result {
            Ok(detail) => {
                self.view.detail = Some(Arc::new(detail));
                self.mark(Node::DetailData);
                for node in self.graph.affected(Node::DetailData) {
                    self.recompute(node);
                }
                self.settle(Phase::SelectionReady);
                Applied::Updated
            }
            Err(err) => self.fail(Node::DetailData, err),
        }
    }

    fn invalidate(&mut self, node: Node) {
        match node {
            Node::Region => self.view.region = None,
            Node::RegionData => self.view.features = None,
            Node::MapLayer => self.view.layer = None,
            Node::Selection => self.view.selection.clear(),
            Node::DetailData => {
                self.view.detail = None;
                self.detail_requests.supersede();
            }
            Node::Chart => self.view.chart = ChartView::default(),
        }
        self.mark(node);
    }

    fn recompute(&mut self, node: Node) {
        match node {
            Node::MapLayer => {
                self.view.layer = self.view.features.as_ref().map(|dataset| {
                    Arc::new(choropleth::render(
                        dataset,
                        &self.config.metric,
                        &self.config.style,
                    ))
                });
            }
            Node::Chart => {
                self.view.chart = chart::render(self.view.detail.as_deref(), &self.config.cohorts);
            }
            // Inputs and fetched data are set by events, not derived.
            Node::Region | Node::RegionData | Node::Selection | Node::DetailData => return,
        }
        self.mark(node);
    }

    fn settle(&mut self, phase: Phase) {
        self.phase = phase;
        if phase.is_settled() {
            self.settled = (phase, self.view.clone());
        }
    }

    fn fail(&mut self, stage: Node, err: RemoteFetchError) -> Applied {
        let message = err.to_string();
        warn!("Fetching {} failed: {}", stage, message);
        self.notices.push(Notice {
            stage,
            message: message.clone(),
        });
        let (phase, view) = self.settled.clone();
        self.phase = phase;
        self.view = view;
        for node in self.graph.order().to_vec() {
            self.mark(node);
        }
        Applied::Failed(message)
    }

    fn mark(&mut self, node: Node) {
        if !self.changes.contains(&node) {
            self.changes.push(node);
        }
    }
}

//! Async driver: applies UI events to a session one at a time and runs the
//! remote fetches as spawned tasks whose results come back as events.

use crate::state::{DetailRequest, Node, RegionRequest, Session, SessionError};
use crate::surface::{ChartSurface, MapSurface};
use crate::ticket::Ticket;
use cme_census::error::RemoteFetchError;
use cme_census::feature::{DetailDataset, FeatureDataset, FeatureId};
use cme_census::fetch::{DetailFetcher, RegionFetcher};
use cme_census::region::Region;
use cme_census::service::StatisticalService;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{AbortHandle, JoinError};

#[derive(Debug)]
pub enum Event {
    SelectRegion(Region),
    FeatureClick(Option<FeatureId>),
    /// Fetch the detail of the current selection again.
    ReloadDetail,
    RegionLoaded(Ticket, Result<FeatureDataset, RemoteFetchError>),
    DetailLoaded(Ticket, Result<DetailDataset, RemoteFetchError>),
    Close,
}

/// Cloneable sender a UI uses to feed a running dashboard.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    tx: UnboundedSender<Event>,
}

impl DashboardHandle {
    pub fn send(&self, event: Event) -> Result<(), SessionError> {
        self.tx.send(event).map_err(|_| SessionError::Closed)
    }

    pub fn select_region(&self, region: Region) -> Result<(), SessionError> {
        self.send(Event::SelectRegion(region))
    }

    pub fn click(&self, feature_id: Option<FeatureId>) -> Result<(), SessionError> {
        self.send(Event::FeatureClick(feature_id))
    }

    pub fn close(&self) -> Result<(), SessionError> {
        self.send(Event::Close)
    }
}

pub struct Dashboard<S, M, C> {
    session: Session,
    service: Arc<S>,
    region_fetcher: RegionFetcher,
    detail_fetcher: DetailFetcher,
    map: M,
    chart: C,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    region_task: Option<AbortHandle>,
    detail_task: Option<AbortHandle>,
}

impl<S, M, C> Dashboard<S, M, C>
where
    S: StatisticalService + 'static,
    M: MapSurface,
    C: ChartSurface,
{
    pub fn new(session: Session, service: Arc<S>, map: M, mut chart: C) -> Self {
        let config = session.config();
        let region_fetcher = RegionFetcher::new(config.metric.clone(), config.dataset.clone());
        let detail_fetcher = DetailFetcher::new(config.cohorts.clone(), config.dataset.clone());
        chart.show(session.chart());
        let (tx, rx) = mpsc::unbounded_channel();
        Dashboard {
            session,
            service,
            region_fetcher,
            detail_fetcher,
            map,
            chart,
            tx,
            rx,
            region_task: None,
            detail_task: None,
        }
    }

    pub fn handle(&self) -> DashboardHandle {
        DashboardHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    /// Apply one event and push any visible change to the surfaces.
    /// Returns false once the dashboard is closed.
    pub fn apply(&mut self, event: Event) -> bool {
        match event {
            Event::SelectRegion(region) => {
                let request = self.session.select_region(region);
                abort(&mut self.detail_task);
                self.spawn_region(request);
            }
            Event::FeatureClick(click) => match self.session.feature_click(click) {
                Ok(Some(request)) => self.spawn_detail(request),
                Ok(None) => {}
                Err(err) => debug!("Click not applied: {}", err),
            },
            Event::ReloadDetail => match self.session.request_detail() {
                Ok(request) => self.spawn_detail(request),
                Err(err) => debug!("Detail reload skipped: {}", err),
            },
            Event::RegionLoaded(ticket, result) => {
                let applied = self.session.complete_region(ticket, result);
                debug!("Region result #{}: {:?}", ticket.generation(), applied);
            }
            Event::DetailLoaded(ticket, result) => {
                let applied = self.session.complete_detail(ticket, result);
                debug!("Detail result #{}: {:?}", ticket.generation(), applied);
            }
            Event::Close => {
                info!("Dashboard closed");
                abort(&mut self.region_task);
                abort(&mut self.detail_task);
                return false;
            }
        }
        self.sync_surfaces();
        true
    }

    /// Process events until no fetch is outstanding and the queue is empty.
    /// Returns false if the dashboard was closed meanwhile.
    pub async fn settle(&mut self) -> bool {
        loop {
            while let Ok(event) = self.rx.try_recv() {
                if !self.apply(event) {
                    return false;
                }
            }
            if !self.session.is_loading() {
                return true;
            }
            match self.rx.recv().await {
                Some(event) => {
                    if !self.apply(event) {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }

    /// Process events until `Close`.
    pub async fn run(&mut self) {
        while let Some(event) = self.rx.recv().await {
            if !self.apply(event) {
                break;
            }
        }
    }

    fn spawn_region(&mut self, request: RegionRequest) {
        abort(&mut self.region_task);
        let service = Arc::clone(&self.service);
        let fetcher = self.region_fetcher.clone();
        let ticket = request.ticket;
        let fetch = async move { fetcher.fetch(&*service, &request.region).await };
        self.region_task = Some(spawn_fetch(self.tx.clone(), fetch, move |result| {
            Event::RegionLoaded(ticket, result)
        }));
    }

    fn spawn_detail(&mut self, request: DetailRequest) {
        abort(&mut self.detail_task);
        let service = Arc::clone(&self.service);
        let fetcher = self.detail_fetcher.clone();
        let ticket = request.ticket;
        let fetch = async move {
            fetcher
                .fetch(&*service, &request.region, &request.feature_id)
                .await
        };
        self.detail_task = Some(spawn_fetch(self.tx.clone(), fetch, move |result| {
            Event::DetailLoaded(ticket, result)
        }));
    }

    fn sync_surfaces(&mut self) {
        let changes = self.session.take_changes();
        if changes.contains(&Node::MapLayer) {
            self.map.replace_layer(self.session.layer());
        }
        if changes.contains(&Node::Chart) {
            self.chart.show(self.session.chart());
        }
        for notice in self.session.take_notices() {
            self.chart.notify(&notice);
        }
    }
}

/// Run `fetch` on its own task and send its outcome back as an event.
///
/// A watcher awaits the task: a panic is delivered as a failed fetch so the
/// session rolls back instead of waiting forever, an aborted fetch delivers
/// nothing.
fn spawn_fetch<T, F, D>(tx: UnboundedSender<Event>, fetch: F, deliver: D) -> AbortHandle
where
    T: Send + 'static,
    F: Future<Output = Result<T, RemoteFetchError>> + Send + 'static,
    D: FnOnce(Result<T, RemoteFetchError>) -> Event + Send + 'static,
{
    let task = tokio::spawn(fetch);
    let handle = task.abort_handle();
    tokio::spawn(async move {
        let result = match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let message = panic_message(err);
                warn!("Fetch task panicked: {}", message);
                Err(RemoteFetchError::TaskFailed(message))
            }
            Err(_) => return,
        };
        // The dashboard may be gone; nothing to deliver to then.
        let _ = tx.send(deliver(result));
    });
    handle
}

fn panic_message(err: JoinError) -> String {
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Best-effort cancellation of a superseded fetch; a result that still
/// arrives is dropped by its ticket.
fn abort(task: &mut Option<AbortHandle>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Notice, Phase, SessionConfig};
    use crate::surface::Viewport;
    use crate::testing::{small_service, tract_id, tract_rows};
    use cme_census::service::{MemoryService, Query, Row};
    use cme_census::Result;
    use cme_render::chart::ChartView;
    use cme_render::choropleth::MapLayer;
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::Duration;

    fn millis(delays: &[(&str, u64)]) -> HashMap<String, Duration> {
        delays
            .iter()
            .map(|(key, ms)| (key.to_string(), Duration::from_millis(*ms)))
            .collect()
    }

    /// Answers like the inner service, after a delay keyed by the queried
    /// feature or, failing that, by state. Queries for `crash_fips` panic.
    struct DelayedService {
        inner: MemoryService,
        delays: HashMap<String, Duration>,
        feature_delays: HashMap<String, Duration>,
        crash_fips: Option<String>,
    }

    impl DelayedService {
        fn new(inner: MemoryService, delays: &[(&str, u64)]) -> Self {
            DelayedService {
                inner,
                delays: millis(delays),
                feature_delays: HashMap::new(),
                crash_fips: None,
            }
        }

        fn with_feature_delays(mut self, delays: &[(&str, u64)]) -> Self {
            self.feature_delays = millis(delays);
            self
        }

        fn crashing_in(mut self, fips: &str) -> Self {
            self.crash_fips = Some(fips.to_string());
            self
        }
    }

    impl StatisticalService for DelayedService {
        fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>>> + Send {
            let feature_delay = query
                .filter
                .within
                .as_ref()
                .and_then(|id| self.feature_delays.get(id.as_str()));
            let delay = feature_delay
                .or_else(|| self.delays.get(&query.filter.state.fips))
                .copied()
                .unwrap_or(Duration::from_millis(10));
            let crash = self.crash_fips.as_ref() == Some(&query.filter.state.fips);
            let answer = self.inner.query(query);
            async move {
                tokio::time::sleep(delay).await;
                if crash {
                    panic!("service crashed");
                }
                answer.await
            }
        }
    }

    #[derive(Default)]
    struct RecordingMap {
        /// (region abbreviation, feature count) per replacement; `None` when withdrawn.
        layers: Vec<Option<(String, usize)>>,
        viewport: Option<Viewport>,
    }

    impl MapSurface for RecordingMap {
        fn replace_layer(&mut self, layer: Option<&MapLayer>) {
            if self.viewport.is_none() {
                self.viewport = layer.and_then(MapLayer::bounds).map(Viewport::fit);
            }
            self.layers
                .push(layer.map(|l| (l.region.abbr.clone(), l.len())));
        }

        fn viewport(&self) -> Option<Viewport> {
            self.viewport
        }
    }

    #[derive(Default)]
    struct RecordingChart {
        shown: Vec<ChartView>,
        notices: Vec<Notice>,
    }

    impl ChartSurface for RecordingChart {
        fn show(&mut self, chart: &ChartView) {
            self.shown.push(chart.clone());
        }

        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    type TestDashboard = Dashboard<DelayedService, RecordingMap, RecordingChart>;

    fn dashboard(service: DelayedService) -> (TestDashboard, Arc<DelayedService>) {
        let service = Arc::new(service);
        let session = Session::new(SessionConfig::default()).unwrap();
        let dashboard = Dashboard::new(
            session,
            Arc::clone(&service),
            RecordingMap::default(),
            RecordingChart::default(),
        );
        (dashboard, service)
    }

    fn region(abbr: &str) -> Region {
        Region::lookup(abbr).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_region_never_reaches_the_map() {
        let service = DelayedService::new(small_service(), &[("10", 5_000), ("44", 10)]);
        let (mut dashboard, _) = dashboard(service);
        let handle = dashboard.handle();
        handle.select_region(region("DE")).unwrap();
        handle.select_region(region("RI")).unwrap();
        assert!(dashboard.settle().await);

        assert_eq!(dashboard.session().phase(), Phase::RegionReady);
        let shown: Vec<_> = dashboard.map().layers.iter().flatten().collect();
        assert_eq!(shown, vec![&("RI".to_string(), 2usize)]);

        // Let the aborted Delaware fetch's deadline pass; nothing changes.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(dashboard.settle().await);
        assert_eq!(
            dashboard.session().layer().map(|l| l.region.abbr.as_str()),
            Some("RI")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn texas_click_shows_age_cohorts() {
        let inner = MemoryService::new(tract_rows("48201", 5_000, 3));
        let (mut dashboard, _) = dashboard(DelayedService::new(inner, &[]));
        dashboard.apply(Event::SelectRegion(region("TX")));
        assert!(dashboard.settle().await);
        assert_eq!(dashboard.session().layer().map(|l| l.len()), Some(5_000));
        let viewport = dashboard.map().viewport();
        assert!(viewport.is_some());

        dashboard.apply(Event::FeatureClick(Some("48201100100".into())));
        assert_eq!(dashboard.session().phase(), Phase::SelectionLoading);
        assert!(dashboard.chart().shown.last().unwrap().is_placeholder());
        assert!(dashboard.settle().await);

        let chart = dashboard.session().chart().chart().unwrap();
        assert_eq!(chart.feature_id.as_str(), "48201100100");
        assert_eq!(chart.bars.len(), 18);
        assert_eq!(chart.bars[0].label, "Under 5");
        assert_eq!(chart.bars[17].label, "85 and over");
        // The click leaves the map untouched.
        assert_eq!(dashboard.map().layers.iter().flatten().count(), 1);
        assert_eq!(dashboard.map().viewport(), viewport);
    }

    #[tokio::test(start_paused = true)]
    async fn region_change_withdraws_chart_immediately() {
        let (mut dashboard, _) = dashboard(DelayedService::new(small_service(), &[]));
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;
        dashboard.apply(Event::FeatureClick(Some(tract_id("10001", 0).into())));
        dashboard.settle().await;
        assert!(dashboard.session().chart().chart().is_some());

        dashboard.apply(Event::SelectRegion(region("RI")));
        assert!(dashboard.chart().shown.last().unwrap().is_placeholder());
        assert_eq!(dashboard.map().layers.last(), Some(&None));
        assert!(dashboard.session().selection().is_none());
        dashboard.settle().await;
        assert_eq!(dashboard.session().phase(), Phase::RegionReady);
        assert!(dashboard.session().chart().is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn clicking_again_refetches_the_same_chart() {
        let (mut dashboard, service) = dashboard(DelayedService::new(small_service(), &[]));
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;
        let id: FeatureId = tract_id("10001", 1).into();

        dashboard.apply(Event::FeatureClick(Some(id.clone())));
        dashboard.settle().await;
        let first = dashboard.session().chart().clone();
        let calls = service.inner.calls();

        dashboard.apply(Event::FeatureClick(Some(id)));
        dashboard.settle().await;
        assert_eq!(service.inner.calls(), calls + 1);
        assert_eq!(dashboard.session().chart(), &first);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_notifies_and_keeps_previous_layer() {
        let (mut dashboard, _) = dashboard(DelayedService::new(small_service(), &[]));
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;
        // No rows for Texas in the small service.
        dashboard.apply(Event::SelectRegion(region("TX")));
        dashboard.settle().await;

        assert_eq!(dashboard.session().phase(), Phase::RegionReady);
        assert_eq!(
            dashboard.map().layers.last(),
            Some(&Some(("DE".to_string(), 3)))
        );
        let notices = &dashboard.chart().notices;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].stage, Node::RegionData);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_clicks_and_reloads_without_selection_do_nothing() {
        let (mut dashboard, service) = dashboard(DelayedService::new(small_service(), &[]));
        dashboard.apply(Event::FeatureClick(None));
        dashboard.apply(Event::ReloadDetail);
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;
        let calls = service.inner.calls();
        let shown = dashboard.chart().shown.len();

        dashboard.apply(Event::FeatureClick(None));
        dashboard.apply(Event::ReloadDetail);
        assert!(dashboard.settle().await);
        assert_eq!(service.inner.calls(), calls);
        assert_eq!(dashboard.chart().shown.len(), shown);
        assert!(dashboard.chart().notices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_click_never_reaches_the_chart() {
        let slow = tract_id("10001", 0);
        let fast = tract_id("10001", 1);
        let service = DelayedService::new(small_service(), &[])
            .with_feature_delays(&[(slow.as_str(), 5_000), (fast.as_str(), 10)]);
        let (mut dashboard, _) = dashboard(service);
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;

        let handle = dashboard.handle();
        handle.click(Some(slow.as_str().into())).unwrap();
        handle.click(Some(fast.as_str().into())).unwrap();
        assert!(dashboard.settle().await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(dashboard.settle().await);

        let charted: Vec<&str> = dashboard
            .chart()
            .shown
            .iter()
            .filter_map(|view| view.chart())
            .map(|chart| chart.feature_id.as_str())
            .collect();
        assert_eq!(charted, vec![fast.as_str()]);
        assert_eq!(dashboard.session().phase(), Phase::SelectionReady);
        assert!(dashboard.chart().notices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_fetch_rolls_back_instead_of_hanging() {
        let service = DelayedService::new(small_service(), &[]).crashing_in("44");
        let (mut dashboard, _) = dashboard(service);
        dashboard.apply(Event::SelectRegion(region("DE")));
        dashboard.settle().await;
        dashboard.apply(Event::SelectRegion(region("RI")));

        let settled = tokio::time::timeout(Duration::from_secs(60), dashboard.settle()).await;
        assert_eq!(settled.ok(), Some(true));
        assert_eq!(dashboard.session().phase(), Phase::RegionReady);
        assert_eq!(
            dashboard.session().layer().map(|l| l.region.abbr.as_str()),
            Some("DE")
        );
        let notices = &dashboard.chart().notices;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].stage, Node::RegionData);
        assert!(notices[0].message.contains("service crashed"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_the_loop() {
        let (mut dashboard, _) = dashboard(DelayedService::new(small_service(), &[]));
        let handle = dashboard.handle();
        handle.select_region(region("DE")).unwrap();
        handle.click(Some(tract_id("10001", 0).into())).unwrap();
        handle.close().unwrap();
        dashboard.run().await;
        // The click arrived before the layer loaded and was ignored.
        assert!(dashboard.session().selection().is_none());
    }
}

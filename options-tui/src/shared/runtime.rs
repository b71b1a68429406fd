//! Refresh runtime: drives a [`RefreshController`] on a single tokio task
//!
//! The task owns the controller and is the only writer of its state. User actions,
//! settled I/O and ticks are all funnelled through one `select!` loop, so events are
//! applied strictly one at a time. I/O commands run as child tasks on a [`JoinSet`]
//! and report back as events; shutting the loop down aborts whatever is in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use options_data::OptionsGateway;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::aggregation::ChartSeries;
use super::config::DashboardConfig;
use super::controller::{
    Command, FetchRequest, FetchSettled, RefreshController, RefreshEvent, UserAction,
};
use super::state::RefreshState;

/// Presentation surface, invoked with a consistent snapshot after every applied event
pub trait Render: Send + 'static {
    fn render(&mut self, state: &RefreshState, series: &ChartSeries);
}

/// Snapshot published by [`WatchRenderer`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub state: RefreshState,
    pub series: ChartSeries,
}

/// [`Render`] implementation publishing every snapshot on a watch channel, letting a UI
/// thread draw at its own pace
#[derive(Debug)]
pub struct WatchRenderer {
    tx: watch::Sender<DashboardView>,
}

impl WatchRenderer {
    pub fn new() -> (Self, watch::Receiver<DashboardView>) {
        let (tx, rx) = watch::channel(DashboardView::default());
        (Self { tx }, rx)
    }
}

impl Render for WatchRenderer {
    fn render(&mut self, state: &RefreshState, series: &ChartSeries) {
        self.tx.send_replace(DashboardView {
            state: state.clone(),
            series: series.clone(),
        });
    }
}

/// Handle to a running refresh loop
#[derive(Debug)]
pub struct RefreshHandle {
    actions: mpsc::UnboundedSender<UserAction>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Forward a user action. Returns false once the loop has stopped.
    pub fn send(&self, action: UserAction) -> bool {
        self.actions.send(action).is_ok()
    }

    /// Stop the loop and wait for it to exit. No gateway call is issued afterwards.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Err(error) = (&mut self.task).await {
            warn!(%error, "refresh loop ended abnormally");
        }
    }
}

/// Shortest periodic refresh cadence the loop accepts
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the refresh loop. Issues the startup fetch immediately and a three-way refresh
/// every `config.refresh_interval` thereafter, raised to [`MIN_REFRESH_INTERVAL`].
pub fn spawn_refresh_loop<G, R>(gateway: Arc<G>, renderer: R, config: &DashboardConfig) -> RefreshHandle
where
    G: OptionsGateway + ?Sized + 'static,
    R: Render,
{
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let controller =
        RefreshController::new(config.time_range).with_refetch_delay(config.refetch_delay);
    let refresh_interval = config.refresh_interval.max(MIN_REFRESH_INTERVAL);
    if refresh_interval != config.refresh_interval {
        warn!(
            requested = ?config.refresh_interval,
            used = ?refresh_interval,
            "refresh interval below minimum"
        );
    }

    let task = tokio::spawn(async move {
        run_refresh_loop(
            controller,
            gateway,
            renderer,
            refresh_interval,
            action_rx,
            shutdown_rx,
        )
        .await;
    });

    RefreshHandle {
        actions: action_tx,
        shutdown: Some(shutdown_tx),
        task,
    }
}

async fn run_refresh_loop<G, R>(
    mut controller: RefreshController,
    gateway: Arc<G>,
    mut renderer: R,
    refresh_interval: Duration,
    mut actions: mpsc::UnboundedReceiver<UserAction>,
    mut shutdown: oneshot::Receiver<()>,
) where
    G: OptionsGateway + ?Sized + 'static,
    R: Render,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut executor = Executor {
        gateway,
        events: event_tx,
        tasks: JoinSet::new(),
    };

    // First tick one full interval after startup
    let mut ticker = interval_at(Instant::now() + refresh_interval, refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(?refresh_interval, range = %controller.state().time_range, "refresh loop started");
    renderer.render(controller.state(), controller.series());
    apply(&mut controller, &mut renderer, &mut executor, RefreshEvent::Startup);

    loop {
        let event = tokio::select! {
            biased;

            _ = &mut shutdown => break,

            action = actions.recv() => match action {
                Some(action) => RefreshEvent::from(action),
                None => break,
            },

            Some(event) = event_rx.recv() => event,

            _ = ticker.tick() => RefreshEvent::Tick,
        };

        apply(&mut controller, &mut renderer, &mut executor, event);
        executor.reap();
    }

    executor.tasks.abort_all();
    info!("refresh loop stopped");
}

fn apply<G, R>(
    controller: &mut RefreshController,
    renderer: &mut R,
    executor: &mut Executor<G>,
    event: RefreshEvent,
) where
    G: OptionsGateway + ?Sized + 'static,
    R: Render,
{
    let commands = controller.handle(event);
    renderer.render(controller.state(), controller.series());

    for command in commands {
        executor.execute(command);
    }
}

/// Runs controller [`Command`]s as child tasks reporting back through `events`
struct Executor<G: ?Sized> {
    gateway: Arc<G>,
    events: mpsc::UnboundedSender<RefreshEvent>,
    tasks: JoinSet<()>,
}

impl<G> Executor<G>
where
    G: OptionsGateway + ?Sized + 'static,
{
    fn execute(&mut self, command: Command) {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();

        match command {
            Command::Fetch(request) => {
                debug!(
                    epoch = request.epoch,
                    range = %request.range,
                    chart = request.chart,
                    latest = request.latest,
                    status = request.status,
                    "issuing fetch"
                );
                self.tasks.spawn(async move {
                    let settled = fetch(gateway.as_ref(), request).await;
                    let _ = events.send(RefreshEvent::FetchSettled(settled));
                });
            }
            Command::TriggerCollection => {
                self.tasks.spawn(async move {
                    let result = gateway.trigger_collection().await;
                    let _ = events.send(RefreshEvent::TriggerSettled(result));
                });
            }
            Command::ScheduleRefetch(delay) => {
                debug!(?delay, "scheduling refetch");
                self.tasks.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(RefreshEvent::DelayedRefetch);
                });
            }
        }
    }

    /// Drop finished child tasks
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(error) = result {
                warn!(%error, "refresh task failed");
            }
        }
    }
}

/// Issue every request selected by `request` concurrently and wait for all of them to
/// settle. One failing request never cancels the others.
async fn fetch<G>(gateway: &G, request: FetchRequest) -> FetchSettled
where
    G: OptionsGateway + ?Sized,
{
    let hours = request.range.hours();

    let (chart, latest, status) = tokio::join!(
        async {
            match request.chart {
                true => Some(gateway.fetch_chart_series(hours).await),
                false => None,
            }
        },
        async {
            match request.latest {
                true => Some(gateway.fetch_latest_snapshot().await),
                false => None,
            }
        },
        async {
            match request.status {
                true => Some(gateway.fetch_system_status().await),
                false => None,
            }
        },
    );

    FetchSettled {
        request,
        settled_at: Utc::now(),
        chart,
        latest,
        status,
    }
}

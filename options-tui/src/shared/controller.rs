//! Refresh Controller: the reducer behind the dashboard
//!
//! Every transition is driven by a typed [`RefreshEvent`] and answers with the
//! [`Command`]s (I/O) the runtime should perform. No I/O happens here, so every
//! transition can be exercised without a runtime or a terminal attached.
//!
//! Ordering is by fetch epoch, never by arrival: each [`FetchRequest`] carries a
//! monotonically increasing epoch, and a settled result older than the last applied
//! result of the same kind (or issued for a range that is no longer selected) is
//! discarded as stale.

use std::time::Duration;

use chrono::{DateTime, Utc};
use options_data::{ChartData, CollectionAck, GatewayError, OptionSample, SystemStatus};
use tracing::{debug, info, warn};

use super::aggregation::{aggregate, ChartSeries};
use super::state::{ErrorNotice, Phase, RefreshState, TimeRange};

/// Default delay between a manual trigger and the refetch that picks up its data
pub const DEFAULT_REFETCH_DELAY: Duration = Duration::from_secs(2);

/// The four actions the presentation surface may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ChangeRange(TimeRange),
    TriggerCollection,
    Retry,
    Dismiss,
}

/// Inputs to [`RefreshController::handle`]
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Startup,
    Tick,
    RangeChanged(TimeRange),
    ManualTrigger,
    Retry,
    Dismiss,
    TriggerSettled(Result<CollectionAck, GatewayError>),
    DelayedRefetch,
    FetchSettled(FetchSettled),
}

impl From<UserAction> for RefreshEvent {
    fn from(action: UserAction) -> Self {
        match action {
            UserAction::ChangeRange(range) => RefreshEvent::RangeChanged(range),
            UserAction::TriggerCollection => RefreshEvent::ManualTrigger,
            UserAction::Retry => RefreshEvent::Retry,
            UserAction::Dismiss => RefreshEvent::Dismiss,
        }
    }
}

/// A fetch cycle to issue. All selected requests go out together and settle together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub epoch: u64,
    pub range: TimeRange,
    pub chart: bool,
    pub latest: bool,
    pub status: bool,
}

/// All-settled outcome of a [`FetchRequest`]. `None` marks a request that was not issued.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettled {
    pub request: FetchRequest,
    pub settled_at: DateTime<Utc>,
    pub chart: Option<Result<ChartData, GatewayError>>,
    pub latest: Option<Result<Vec<OptionSample>, GatewayError>>,
    pub status: Option<Result<SystemStatus, GatewayError>>,
}

/// I/O the runtime performs on behalf of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Fetch(FetchRequest),
    TriggerCollection,
    /// Deliver [`RefreshEvent::DelayedRefetch`] once after the delay
    ScheduleRefetch(Duration),
}

/// Why a settled result was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    RangeChanged {
        issued_for: TimeRange,
        current: TimeRange,
    },
    Superseded {
        epoch: u64,
        applied: u64,
    },
}

/// Epoch of the last applied success per result kind
#[derive(Debug, Clone, Copy, Default)]
struct AppliedEpochs {
    chart: u64,
    latest: u64,
    status: u64,
}

/// Owner of [`RefreshState`] and the refresh scheduling policy
#[derive(Debug)]
pub struct RefreshController {
    state: RefreshState,
    series: ChartSeries,
    next_epoch: u64,
    startup_epoch: Option<u64>,
    applied: AppliedEpochs,
    /// Epoch of the newest failed chart or latest fetch
    failed_epoch: u64,
    refetch_delay: Duration,
}

impl RefreshController {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            state: RefreshState::new(time_range),
            series: ChartSeries::default(),
            next_epoch: 1,
            startup_epoch: None,
            applied: AppliedEpochs::default(),
            failed_epoch: 0,
            refetch_delay: DEFAULT_REFETCH_DELAY,
        }
    }

    pub fn with_refetch_delay(mut self, delay: Duration) -> Self {
        self.refetch_delay = delay;
        self
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    /// Chart rows derived from the current raw samples
    pub fn series(&self) -> &ChartSeries {
        &self.series
    }

    /// Apply an event, returning the I/O to perform
    pub fn handle(&mut self, event: RefreshEvent) -> Vec<Command> {
        match event {
            RefreshEvent::Startup => {
                if self.startup_epoch.is_some() {
                    warn!("ignoring repeated startup");
                    return Vec::new();
                }
                self.state.phase = Phase::Initializing;
                self.state.loading = true;

                let request = self.request(true, true, true);
                self.startup_epoch = Some(request.epoch);
                info!(range = %request.range, "starting initial load");
                vec![Command::Fetch(request)]
            }
            RefreshEvent::Tick => {
                debug!("periodic refresh");
                vec![Command::Fetch(self.request(true, true, true))]
            }
            RefreshEvent::RangeChanged(range) => {
                info!(from = %self.state.time_range, to = %range, "time range changed");
                self.state.time_range = range;
                vec![Command::Fetch(self.request(true, false, false))]
            }
            RefreshEvent::ManualTrigger => {
                info!("manual collection requested");
                vec![Command::TriggerCollection]
            }
            RefreshEvent::TriggerSettled(result) => {
                match result {
                    Ok(ack) => info!(
                        status_code = ack.status_code,
                        message = ack.message.as_deref().unwrap_or_default(),
                        "collection triggered"
                    ),
                    Err(error) => {
                        warn!(%error, "failed to trigger collection");
                        self.state.error = Some(ErrorNotice::TriggerCollection);
                    }
                }
                // Refetch regardless of the trigger outcome
                vec![Command::ScheduleRefetch(self.refetch_delay)]
            }
            RefreshEvent::DelayedRefetch => {
                debug!("refetching after manual trigger");
                vec![Command::Fetch(self.request(true, true, false))]
            }
            RefreshEvent::Retry => {
                self.state.error = None;
                vec![Command::Fetch(self.request(true, true, true))]
            }
            RefreshEvent::Dismiss => {
                self.state.error = None;
                Vec::new()
            }
            RefreshEvent::FetchSettled(settled) => {
                self.merge(settled);
                Vec::new()
            }
        }
    }

    fn request(&mut self, chart: bool, latest: bool, status: bool) -> FetchRequest {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        FetchRequest {
            epoch,
            range: self.state.time_range,
            chart,
            latest,
            status,
        }
    }

    fn merge(&mut self, settled: FetchSettled) {
        let FetchSettled {
            request,
            settled_at,
            chart,
            latest,
            status,
        } = settled;

        let mut critical_applied = false;
        let mut critical_failed = false;

        if let Some(result) = chart {
            match self.chart_staleness(&request) {
                Some(reason) => debug!(epoch = request.epoch, ?reason, "discarding stale chart data"),
                None => match result {
                    Ok(data) => {
                        self.applied.chart = request.epoch;
                        self.state.raw_samples = data.into_samples();
                        self.series = aggregate(&self.state.raw_samples);
                        critical_applied = true;
                        debug!(
                            epoch = request.epoch,
                            samples = self.state.raw_samples.len(),
                            rows = self.series.len(),
                            "applied chart data"
                        );
                    }
                    Err(error) => {
                        warn!(%error, "failed to fetch chart data");
                        self.record_failure(request.epoch, ErrorNotice::ChartData);
                        critical_failed = true;
                    }
                },
            }
        }

        if let Some(result) = latest {
            match superseded(request.epoch, self.applied.latest) {
                Some(reason) => debug!(epoch = request.epoch, ?reason, "discarding stale latest data"),
                None => match result {
                    Ok(samples) => {
                        self.applied.latest = request.epoch;
                        self.state.replace_latest(samples);
                        self.state.last_update = Some(settled_at);
                        critical_applied = true;
                    }
                    Err(error) => {
                        warn!(%error, "failed to fetch latest data");
                        self.record_failure(request.epoch, ErrorNotice::LatestData);
                        critical_failed = true;
                    }
                },
            }
        }

        if let Some(result) = status {
            match superseded(request.epoch, self.applied.status) {
                Some(reason) => debug!(epoch = request.epoch, ?reason, "discarding stale status"),
                None => match result {
                    Ok(status) => {
                        self.applied.status = request.epoch;
                        self.state.status = Some(status);
                    }
                    // Advisory only, never surfaces to the user
                    Err(error) => warn!(%error, "failed to fetch system status"),
                },
            }
        }

        // An older cycle settling late never hides a newer failure
        if critical_applied
            && !critical_failed
            && request.epoch > self.failed_epoch
            && matches!(
                self.state.error,
                Some(ErrorNotice::ChartData | ErrorNotice::LatestData)
            )
        {
            info!("refresh recovered, clearing error");
            self.state.error = None;
        }

        if self.startup_epoch == Some(request.epoch) && self.state.phase == Phase::Initializing {
            self.state.phase = Phase::Ready;
            self.state.loading = false;
            info!(rows = self.series.len(), "initial load complete");
        }
    }

    /// Surface a fetch failure unless a newer cycle has already failed
    fn record_failure(&mut self, epoch: u64, notice: ErrorNotice) {
        if epoch < self.failed_epoch {
            debug!(epoch, failed_epoch = self.failed_epoch, ?notice, "older failure ignored");
            return;
        }
        self.failed_epoch = epoch;
        self.state.error = Some(notice);
    }

    fn chart_staleness(&self, request: &FetchRequest) -> Option<StaleReason> {
        if request.range != self.state.time_range {
            return Some(StaleReason::RangeChanged {
                issued_for: request.range,
                current: self.state.time_range,
            });
        }
        superseded(request.epoch, self.applied.chart)
    }
}

fn superseded(epoch: u64, applied: u64) -> Option<StaleReason> {
    (epoch < applied).then_some(StaleReason::Superseded { epoch, applied })
}

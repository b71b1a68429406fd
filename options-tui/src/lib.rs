/// BTC Options Dashboard - Shared Library
///
/// Everything behind the `options-dashboard` binary:
/// - Aggregation of raw option samples into chart rows
/// - The refresh controller deciding when to fetch and how results merge
/// - A tokio runtime driving the controller against an [`options_data::OptionsGateway`]
/// - Ratatui widgets rendering the resulting state
pub mod shared;

pub use shared::aggregation::{aggregate, ChartRow, ChartSeries};

pub use shared::config::{ConfigError, DashboardConfig};

// Refresh engine
pub use shared::controller::{
    Command, FetchRequest, FetchSettled, RefreshController, RefreshEvent, StaleReason,
    UserAction,
};
pub use shared::runtime::{
    spawn_refresh_loop, DashboardView, RefreshHandle, Render, WatchRenderer,
    MIN_REFRESH_INTERVAL,
};
pub use shared::state::{ErrorNotice, Phase, RefreshState, TimeRange, UnsupportedTimeRange};

pub use shared::widget::render_dashboard;

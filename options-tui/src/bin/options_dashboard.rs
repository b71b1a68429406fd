/// BTC Options Dashboard
///
/// Polls the options backend through the refresh loop and renders premiums, implied
/// volatility and the latest snapshot per moneyness bucket. Logs go to a file since
/// the terminal belongs to the UI.
use std::{
    error::Error,
    fs::File,
    io,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use options_data::HttpGateway;
use options_tui::{
    render_dashboard, spawn_refresh_loop, DashboardConfig, DashboardView, RefreshHandle,
    TimeRange, UserAction, WatchRenderer,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tokio::sync::watch;
use tracing::{info, warn};

const POLL_RATE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = DashboardConfig::from_env()?;
    init_logging(&config.log_file)?;

    let api_url = config.api_url()?;
    let gateway = Arc::new(HttpGateway::with_timeout(&api_url, config.request_timeout)?);
    info!(%api_url, range = %config.time_range, "starting options dashboard");

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (renderer, mut views) = WatchRenderer::new();
    let handle = spawn_refresh_loop(gateway, renderer, &config);

    let result = run_ui(&mut terminal, &handle, &mut views);
    handle.shutdown().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("options dashboard stopped");
    result
}

/// Initialize logging into `path`
fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn run_ui<B: Backend>(
    terminal: &mut Terminal<B>,
    handle: &RefreshHandle,
    views: &mut watch::Receiver<DashboardView>,
) -> Result<(), Box<dyn Error>> {
    loop {
        let view = views.borrow_and_update().clone();
        terminal.draw(|f| render_dashboard(f, &view))?;

        if !event::poll(POLL_RATE)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let action = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char(digit @ '1'..='6') => digit
                .to_digit(10)
                .and_then(|digit| TimeRange::ALL.get(digit as usize - 1))
                .map(|range| UserAction::ChangeRange(*range)),
            KeyCode::Left => Some(UserAction::ChangeRange(view.state.time_range.narrower())),
            KeyCode::Right => Some(UserAction::ChangeRange(view.state.time_range.wider())),
            KeyCode::Char('t') => Some(UserAction::TriggerCollection),
            KeyCode::Char('r') => Some(UserAction::Retry),
            KeyCode::Char('d') => Some(UserAction::Dismiss),
            _ => None,
        };

        if let Some(action) = action {
            if !handle.send(action) {
                warn!(?action, "refresh loop is gone, exiting");
                break;
            }
        }
    }

    Ok(())
}

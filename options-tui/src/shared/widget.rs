//! Ratatui rendering of a [`DashboardView`]

use chrono::{DateTime, Utc};
use options_data::{OptionSample, OptionType, SystemStatus};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::aggregation::{ChartRow, ChartSeries};
use super::runtime::DashboardView;
use super::state::{RefreshState, TimeRange};

const C_ITM: Color = Color::Rgb(100, 220, 100);
const C_ATM: Color = Color::Rgb(100, 180, 220);
const C_OTM: Color = Color::Rgb(220, 180, 100);
const C_SPOT: Color = Color::Rgb(220, 220, 220);
const C_OVERLAY: Color = Color::Rgb(180, 120, 220);
const C_ERROR: Color = Color::Rgb(220, 100, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);

const KEY_HINTS: &str =
    " [1-6] range  [←/→] step  [t] trigger collection  [r] retry  [d] dismiss  [q] quit ";

/// (x, y) points of one uninterrupted run of a series
type Segment = Vec<(f64, f64)>;

fn option_color(option_type: OptionType) -> Color {
    match option_type {
        OptionType::Itm => C_ITM,
        OptionType::Atm => C_ATM,
        OptionType::Otm => C_OTM,
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn x_value(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64
}

/// Render the whole dashboard
pub fn render_dashboard(f: &mut Frame, view: &DashboardView) {
    let state = &view.state;
    if state.loading {
        render_loading(f, f.area());
        return;
    }

    let banner_height = if state.error.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, chunks[0], state);
    if state.error.is_some() {
        render_error_banner(f, chunks[1], state);
    }
    render_range_selector(f, chunks[2], state.time_range);
    render_latest_panel(f, chunks[3], state);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[4]);
    render_price_chart(f, charts[0], &view.series, state.time_range);
    render_iv_chart(f, charts[1], &view.series, state.time_range);

    f.render_widget(
        Paragraph::new(Span::styled(KEY_HINTS, Style::default().fg(C_DIM))),
        chunks[5],
    );
}

fn render_loading(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" BTC OPTIONS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Loading options data...",
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        )),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_header(f: &mut Frame, area: Rect, state: &RefreshState) {
    let last_update = state
        .last_update
        .map(|at| at.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "--".to_string());

    let line = Line::from(vec![
        Span::styled(
            "BTC OPTIONS ",
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" Last update ", Style::default().fg(C_DIM)),
        Span::styled(last_update, Style::default().fg(C_BRIGHT)),
        Span::styled("  │  ", Style::default().fg(C_DIM)),
        Span::styled(collection_summary(state.status.as_ref()), Style::default().fg(C_DIM)),
    ]);

    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(line).block(block), area);
}

/// One-line summary of the collector schedule
fn collection_summary(status: Option<&SystemStatus>) -> String {
    let Some(status) = status else {
        return "Collector status unknown".to_string();
    };

    let availability = if status.can_collect_now {
        "Collection available now".to_string()
    } else {
        match status.next_collection_slot {
            Some(slot) => format!("Next collection {}", slot.format("%H:%M UTC")),
            None => "Collection unavailable".to_string(),
        }
    };

    match status.last_collection {
        Some(last) => format!("{availability}  │  Last collection {}", last.format("%H:%M UTC")),
        None => availability,
    }
}

fn render_error_banner(f: &mut Frame, area: Rect, state: &RefreshState) {
    let Some(error) = state.error else {
        return;
    };

    let line = Line::from(vec![
        Span::styled(
            error.message(),
            Style::default().fg(C_ERROR).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   [r] retry  [d] dismiss", Style::default().fg(C_DIM)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ERROR));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_range_selector(f: &mut Frame, area: Rect, selected: TimeRange) {
    let mut spans = vec![Span::styled(" Range ", Style::default().fg(C_DIM))];
    for (index, range) in TimeRange::ALL.into_iter().enumerate() {
        let style = if range == selected {
            Style::default()
                .fg(Color::Black)
                .bg(C_ATM)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_BRIGHT)
        };
        spans.push(Span::styled(format!(" {}:{} ", index + 1, range.label()), style));
        spans.push(Span::raw(" "));
    }

    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_latest_panel(f: &mut Frame, area: Rect, state: &RefreshState) {
    let title = match state.headline_sample() {
        Some(sample) => format!(" LATEST  Spot ${:.2} ", sample.spot_price),
        None => " LATEST ".to_string(),
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if state.latest_snapshot.is_empty() {
        render_placeholder(f, inner, "No latest data available yet");
        return;
    }

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(inner);

    for (option_type, area) in OptionType::ALL.into_iter().zip(cards.iter()) {
        render_option_card(
            f,
            *area,
            option_type,
            state.latest_snapshot.get(&option_type),
        );
    }
}

fn render_option_card(f: &mut Frame, area: Rect, option_type: OptionType, sample: Option<&OptionSample>) {
    let color = option_color(option_type);
    let block = Block::default()
        .title(Span::styled(
            format!(" {option_type} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    let Some(sample) = sample else {
        let line = Line::from(Span::styled("No data", Style::default().fg(C_DIM)));
        f.render_widget(Paragraph::new(line).block(block), area);
        return;
    };

    let iv_percent = sample
        .iv
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|iv| format!("{:.2}%", iv.round_dp(2)))
        .unwrap_or_else(|| "--".to_string());
    let lines = vec![
        Line::from(Span::styled(option_type.description(), Style::default().fg(C_DIM))),
        Line::from(Span::styled(sample.symbol.to_string(), Style::default().fg(C_BRIGHT))),
        Line::from(vec![
            Span::styled("Strike  ", Style::default().fg(C_DIM)),
            Span::styled(format!("${}", sample.strike), Style::default().fg(C_BRIGHT)),
        ]),
        Line::from(vec![
            Span::styled("Premium ", Style::default().fg(C_DIM)),
            Span::styled(
                format!("{:.4} BTC", sample.premium),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("IV      ", Style::default().fg(C_DIM)),
            Span::styled(iv_percent, Style::default().fg(color)),
        ]),
        Line::from(Span::styled(option_type.moneyness_note(), Style::default().fg(C_DIM))),
    ];

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_placeholder(f: &mut Frame, area: Rect, message: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), Style::default().fg(C_DIM))),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

/// Split a series into runs of consecutive present values, so absent values render as
/// gaps rather than being bridged or dropped to zero.
fn segments<F>(rows: &[ChartRow], value: F) -> Vec<Segment>
where
    F: Fn(&ChartRow) -> Option<Decimal>,
{
    let mut segments = Vec::new();
    let mut current = Segment::new();

    for row in rows {
        match value(row) {
            Some(y) => current.push((x_value(row.timestamp), to_f64(y))),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Horizontal reference line across the chart's time span
fn reference_line(series: &ChartSeries, value: Option<Decimal>) -> Vec<Segment> {
    match (series.first_timestamp(), series.last_timestamp(), value) {
        (Some(first), Some(last), Some(value)) => {
            let y = to_f64(value);
            vec![vec![(x_value(first), y), (x_value(last), y)]]
        }
        _ => Vec::new(),
    }
}

/// Padded [min, max], never zero-width
fn padded_bounds(bounds: Option<(Decimal, Decimal)>) -> [f64; 2] {
    let Some((min, max)) = bounds else {
        return [0.0, 1.0];
    };
    let (min, max) = (to_f64(min), to_f64(max));
    let pad = match (max - min) * 0.05 {
        pad if pad > 0.0 => pad,
        _ => min.abs().max(1.0) * 0.01,
    };
    [min - pad, max + pad]
}

fn time_axis(series: &ChartSeries, range: TimeRange) -> Axis<'static> {
    let bounds = match (series.first_timestamp(), series.last_timestamp()) {
        (Some(first), Some(last)) if last > first => [x_value(first), x_value(last)],
        (Some(first), _) => [x_value(first) - 60.0, x_value(first) + 60.0],
        _ => [0.0, 1.0],
    };
    let format = if range.hours() > 24 { "%m-%d %H:%M" } else { "%H:%M" };
    let labels: Vec<Span<'static>> = [series.first_timestamp(), series.last_timestamp()]
        .into_iter()
        .flatten()
        .map(|at| Span::styled(at.format(format).to_string(), Style::default().fg(C_DIM)))
        .collect();

    Axis::default().bounds(bounds).labels(labels)
}

fn value_labels(bounds: [f64; 2], precision: usize) -> Vec<Span<'static>> {
    let [min, max] = bounds;
    [min, (min + max) / 2.0, max]
        .into_iter()
        .map(|value| Span::styled(format!("{value:.precision$}"), Style::default().fg(C_DIM)))
        .collect()
}

/// Named line series ready to be borrowed into [`Dataset`]s
struct LineSeries {
    name: String,
    color: Color,
    segments: Vec<Segment>,
}

fn datasets(series: &[LineSeries]) -> Vec<Dataset<'_>> {
    series
        .iter()
        .flat_map(|line| {
            line.segments.iter().enumerate().map(move |(index, segment)| {
                let dataset = Dataset::default()
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(line.color))
                    .data(segment);
                // One legend entry per series
                match index {
                    0 => dataset.name(line.name.clone()),
                    _ => dataset,
                }
            })
        })
        .collect()
}

fn render_line_chart(
    f: &mut Frame,
    area: Rect,
    title: &str,
    lines: &[LineSeries],
    x_axis: Axis<'_>,
    y_bounds: [f64; 2],
    precision: usize,
) {
    let chart = Chart::new(datasets(lines))
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(x_axis)
        .y_axis(
            Axis::default()
                .bounds(y_bounds)
                .labels(value_labels(y_bounds, precision)),
        );

    f.render_widget(chart, area);
}

fn render_price_chart(f: &mut Frame, area: Rect, series: &ChartSeries, range: TimeRange) {
    if series.is_empty() {
        let block = Block::default().title(" PRICE ").borders(Borders::ALL);
        let inner = block.inner(area);
        f.render_widget(block, area);
        render_placeholder(f, inner, "No price data available yet");
        return;
    }

    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let spot = [
        LineSeries {
            name: "Spot".to_string(),
            color: C_SPOT,
            segments: segments(&series.rows, |row| Some(row.spot_price)),
        },
        LineSeries {
            name: "Avg".to_string(),
            color: C_DIM,
            segments: reference_line(series, series.avg_spot),
        },
    ];
    render_line_chart(
        f,
        halves[0],
        " SPOT (USD) ",
        &spot,
        time_axis(series, range),
        padded_bounds(series.spot_bounds()),
        0,
    );

    let premiums: Vec<LineSeries> = OptionType::ALL
        .into_iter()
        .map(|option_type| LineSeries {
            name: option_type.to_string(),
            color: option_color(option_type),
            segments: segments(&series.rows, |row| row.premium(option_type)),
        })
        .collect();
    render_line_chart(
        f,
        halves[1],
        " PREMIUM (BTC) ",
        &premiums,
        time_axis(series, range),
        padded_bounds(series.premium_bounds()),
        4,
    );
}

fn render_iv_chart(f: &mut Frame, area: Rect, series: &ChartSeries, range: TimeRange) {
    if series.is_empty() {
        let block = Block::default().title(" IMPLIED VOLATILITY ").borders(Borders::ALL);
        let inner = block.inner(area);
        f.render_widget(block, area);
        render_placeholder(f, inner, "No IV data available yet");
        return;
    }

    let mut lines: Vec<LineSeries> = OptionType::ALL
        .into_iter()
        .map(|option_type| LineSeries {
            name: format!("{option_type} IV"),
            color: option_color(option_type),
            segments: segments(&series.rows, |row| row.iv(option_type)),
        })
        .collect();
    lines.push(LineSeries {
        name: "Spot (scaled)".to_string(),
        color: C_OVERLAY,
        segments: segments(&series.rows, |row| row.normalized_spot),
    });
    lines.push(LineSeries {
        name: "Avg IV".to_string(),
        color: C_DIM,
        segments: reference_line(series, series.avg_iv),
    });

    render_line_chart(
        f,
        area,
        " IMPLIED VOLATILITY (%) ",
        &lines,
        time_axis(series, range),
        padded_bounds(series.iv_bounds()),
        1,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::aggregation::aggregate;
    use crate::shared::state::ErrorNotice;
    use chrono::TimeZone;
    use ratatui::{backend::TestBackend, Terminal};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn sample(minute: u32, option_type: OptionType) -> OptionSample {
        OptionSample {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            option_type,
            symbol: SmolStr::new("BTC-8MAR24-62000-C"),
            strike: dec!(62000),
            premium: dec!(0.0415),
            iv: dec!(0.4523),
            spot_price: dec!(62000),
        }
    }

    fn draw(view: &DashboardView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 48)).unwrap();
        terminal.draw(|f| render_dashboard(f, view)).unwrap();

        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_segments_split_on_gaps() {
        let series = aggregate(&[
            sample(0, OptionType::Itm),
            sample(0, OptionType::Atm),
            sample(15, OptionType::Atm),
            sample(30, OptionType::Itm),
            sample(30, OptionType::Atm),
            sample(45, OptionType::Itm),
        ]);

        let itm = segments(&series.rows, |row| row.premium(OptionType::Itm));
        assert_eq!(itm.len(), 2);
        assert_eq!(itm[0].len(), 1);
        assert_eq!(itm[1].len(), 2);

        let atm = segments(&series.rows, |row| row.premium(OptionType::Atm));
        assert_eq!(atm.len(), 1);
        assert_eq!(atm[0].len(), 3);

        let otm = segments(&series.rows, |row| row.premium(OptionType::Otm));
        assert!(otm.is_empty());
    }

    #[test]
    fn test_padded_bounds_never_zero_width() {
        let [min, max] = padded_bounds(Some((dec!(62000), dec!(62000))));
        assert!(min < 62000.0 && max > 62000.0);

        assert_eq!(padded_bounds(None), [0.0, 1.0]);
    }

    #[test]
    fn test_collection_summary() {
        assert_eq!(collection_summary(None), "Collector status unknown");

        let status = SystemStatus {
            can_collect_now: true,
            ..Default::default()
        };
        assert_eq!(collection_summary(Some(&status)), "Collection available now");

        let status = SystemStatus {
            can_collect_now: false,
            last_collection: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
            next_collection_slot: Some(Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap()),
        };
        assert_eq!(
            collection_summary(Some(&status)),
            "Next collection 16:00 UTC  │  Last collection 08:00 UTC"
        );
    }

    #[test]
    fn test_loading_screen() {
        let screen = draw(&DashboardView::default());
        assert!(screen.contains("Loading options data..."));
    }

    #[test]
    fn test_empty_data_placeholders() {
        let mut view = DashboardView::default();
        view.state.loading = false;

        let screen = draw(&view);
        assert!(screen.contains("No latest data available yet"));
        assert!(screen.contains("No price data available yet"));
        assert!(screen.contains("No IV data available yet"));
    }

    #[test]
    fn test_error_banner_and_latest_cards() {
        let samples = vec![sample(0, OptionType::Itm), sample(0, OptionType::Atm)];
        let mut view = DashboardView {
            series: aggregate(&samples),
            ..Default::default()
        };
        view.state.loading = false;
        view.state.replace_latest(samples);
        view.state.error = Some(ErrorNotice::ChartData);

        let screen = draw(&view);
        assert!(screen.contains("Failed to fetch chart data"));
        assert!(screen.contains("[r] retry  [d] dismiss"));
        assert!(screen.contains("Spot $62000.00"));
        assert!(screen.contains("0.0415 BTC"));
        assert!(screen.contains("45.23%"));
        assert!(screen.contains("At The Money"));
    }
}

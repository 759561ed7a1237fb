use crate::app::App;
use crate::theme::{self, icons, HEADER_STYLE, MUTED_STYLE, SELECTED_STYLE, WATCHED_STYLE};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, Paragraph, Wrap,
    },
    Frame,
};
use runner_manager_core::{Controller, Series};

pub fn render(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(frame.size());
    render_header(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(45),
        ])
        .split(rows[1]);
    render_controllers(frame, app, columns[0]);
    render_details(frame, app, columns[1]);
    render_plot(frame, app, columns[2]);

    if app.help_open {
        let area = frame.size();
        render_help(frame, area);
    }
}

fn bordered(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::new().fg(theme::BORDER))
        .title(Span::styled(title, HEADER_STYLE))
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let (icon, label) = if app.connected {
        (icons::ONLINE, "connected")
    } else {
        (icons::OFFLINE, "offline")
    };
    let mut spans = vec![
        Span::styled(" Runner Manager ", HEADER_STYLE),
        Span::styled(format!("{icon} {label}"), theme::connection_style(app.connected)),
        Span::styled(format!("  window {}", app.window), MUTED_STYLE),
    ];
    if let Some(note) = &app.status_note {
        spans.push(Span::raw(format!("  {note}")));
    }
    spans.push(Span::styled("  ? help", MUTED_STYLE));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_controllers(frame: &mut Frame, app: &App, area: Rect) {
    let block = bordered("Controllers");
    let topology = app.session.topology();
    if !topology.has_snapshot() {
        frame.render_widget(placeholder("Loading controllers...").block(block), area);
        return;
    }
    if topology.is_empty() {
        frame.render_widget(placeholder("No controllers").block(block), area);
        return;
    }

    let watched = app.session.subscription().target();
    let items: Vec<ListItem> = topology
        .controllers()
        .iter()
        .enumerate()
        .map(|(index, ctrl)| {
            let marker = if index == app.cursor {
                icons::CURSOR
            } else {
                " "
            };
            let is_watched = watched == Some(ctrl.id.as_str());
            let name_style = if index == app.cursor {
                SELECTED_STYLE
            } else if is_watched {
                WATCHED_STYLE
            } else {
                Style::new()
            };
            let mut spans = vec![
                Span::raw(format!("{marker} ")),
                Span::styled(display_name(ctrl), name_style),
                Span::styled(format!(" ({})", ctrl.runners.len()), MUTED_STYLE),
            ];
            if is_watched {
                spans.push(Span::styled(format!(" {}", icons::WATCHED), WATCHED_STYLE));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let block = bordered("Runners");
    let Some(ctrl) = app.highlighted() else {
        frame.render_widget(placeholder("Select a controller").block(block), area);
        return;
    };
    frame.render_widget(
        Paragraph::new(runner_card_lines(ctrl))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn runner_card_lines(ctrl: &Controller) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            display_name(ctrl).to_string(),
            Style::new().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!("id {}", ctrl.id), MUTED_STYLE)),
        Line::default(),
    ];
    if ctrl.runners.is_empty() {
        lines.push(Line::from(Span::styled("No runners", MUTED_STYLE)));
        return lines;
    }
    for runner in &ctrl.runners {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", runner.status),
                theme::status_chip_style(runner.status),
            ),
            Span::raw(" "),
            Span::styled(runner.name.clone(), Style::new().add_modifier(Modifier::BOLD)),
        ]));
        let ip = if runner.private_ipv4.is_empty() {
            "-"
        } else {
            runner.private_ipv4.as_str()
        };
        lines.push(Line::from(Span::styled(format!("   {ip}"), MUTED_STYLE)));
    }
    lines
}

fn render_plot(frame: &mut Frame, app: &App, area: Rect) {
    let Some(target) = app.session.subscription().target() else {
        frame.render_widget(
            placeholder("Press Enter to plot the highlighted controller").block(bordered("Metrics")),
            area,
        );
        return;
    };
    let title = match app.watched() {
        Some(ctrl) => format!("Metrics: {}", display_name(ctrl)),
        None => format!("Metrics: {target}"),
    };
    if app.session.metrics().is_empty() {
        frame.render_widget(placeholder("Loading metrics...").block(bordered(&title)), area);
        return;
    }

    let projection = app.projection();
    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    render_chart(frame, &format!("{title} memory (MB)"), &projection.memory, halves[0]);
    render_chart(frame, &format!("{title} CPU"), &projection.cpu, halves[1]);
}

fn render_chart(frame: &mut Frame, title: &str, series: &[Series], area: Rect) {
    let data: Vec<Vec<(f64, f64)>> = series.iter().map(chart_points).collect();
    let Some((x_bounds, y_bounds)) = bounds(&data) else {
        frame.render_widget(placeholder("No samples in window").block(bordered(title)), area);
        return;
    };

    let datasets: Vec<Dataset> = series
        .iter()
        .zip(data.iter())
        .map(|(series, points)| {
            Dataset::default()
                .name(series.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::new().fg(theme::series_color(series.color)))
                .data(points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(bordered(title))
        .x_axis(
            Axis::default()
                .style(MUTED_STYLE)
                .bounds(x_bounds)
                .labels(vec![
                    Span::raw(clock_label(x_bounds[0])),
                    Span::raw(clock_label(x_bounds[1])),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(MUTED_STYLE)
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.1}", y_bounds[0])),
                    Span::raw(format!("{:.1}", y_bounds[1])),
                ]),
        );
    frame.render_widget(chart, area);
}

fn chart_points(series: &Series) -> Vec<(f64, f64)> {
    series
        .points
        .iter()
        .map(|(at, value)| (at.timestamp() as f64, *value))
        .collect()
}

/// Axis bounds over every point, widened so a single sample still renders.
fn bounds(data: &[Vec<(f64, f64)>]) -> Option<([f64; 2], [f64; 2])> {
    let mut points = data.iter().flatten();
    let first = points.next()?;
    let (mut x_min, mut x_max, mut y_min, mut y_max) = (first.0, first.0, first.1, first.1);
    for (x, y) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    let y_min = y_min.min(0.0);
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    Some(([x_min, x_max], [y_min, y_max]))
}

fn clock_label(secs: f64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn display_name(ctrl: &Controller) -> &str {
    if ctrl.name.trim().is_empty() {
        &ctrl.id
    } else {
        &ctrl.name
    }
}

fn placeholder(text: &str) -> Paragraph<'_> {
    Paragraph::new(Line::from(Span::styled(text, MUTED_STYLE))).wrap(Wrap { trim: true })
}

fn render_help(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(50, 50, area);
    let lines: Vec<Line> = [
        ("j / k, arrows", "move between controllers"),
        ("Enter / p", "toggle metrics plot"),
        ("Esc / x", "close metrics plot"),
        ("w", "cycle chart window"),
        ("r", "refresh controllers"),
        ("?", "toggle this help"),
        ("q", "quit"),
    ]
    .into_iter()
    .map(|(keys, action)| {
        Line::from(vec![
            Span::styled(format!("{keys:<16}"), HEADER_STYLE),
            Span::raw(action),
        ])
    })
    .collect();
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(bordered("Help")), popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}

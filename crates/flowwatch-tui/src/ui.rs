use std::sync::OnceLock;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use tui_banner::Banner;

use flowwatch_core::types::RunStatus;
use flowwatch_sync::output::ArticlePreview;
use flowwatch_sync::{
    AnnotatedGraph, AnnotatedNode, ExecutionPreview, NoticeLevel, OutputView, Rgb, SectionKind,
    Tone,
};

use crate::app::{App, Focus};

const NODE_WIDTH: u16 = 20;
const NODE_HEIGHT: u16 = 4;
/// Longest pretty-printed input shown in the details panel.
const MAX_INPUT_LINES: usize = 12;

/// Banner art, rendered once.
struct BannerCache {
    lines: Vec<String>,
    width: u16,
    height: u16,
}

fn cached_banner() -> &'static BannerCache {
    static CACHE: OnceLock<BannerCache> = OnceLock::new();
    CACHE.get_or_init(|| {
        let text = Banner::new("FLOWWATCH")
            .map(|b| b.style(tui_banner::Style::NeonCyber).render())
            .unwrap_or_else(|_| String::from("FLOWWATCH"));
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let width = lines
            .iter()
            .map(|l| l.chars().count() as u16)
            .max()
            .unwrap_or(9);
        let height = lines.len() as u16;
        BannerCache {
            lines,
            width,
            height,
        }
    })
}

fn rgb(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

/// Draw the TUI layout.
pub fn draw(f: &mut Frame, app: &App, graph: &AnnotatedGraph) {
    let area = f.area();
    let banner = cached_banner();

    // Full art only when it leaves the panels at least 20 rows.
    let header_height =
        if area.width >= banner.width + 2 && area.height >= banner.height + 1 + 20 {
            banner.height + 1
        } else {
            2
        };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header_height),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, app, chunks[0], header_height);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(40)])
        .split(chunks[1]);
    draw_runs(f, app, body[0]);

    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(body[1]);
    draw_graph(f, app, graph, main[0]);

    if app.show_output {
        let lower = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(main[1]);
        draw_details(f, app, lower[0]);
        draw_output(f, app, lower[1]);
    } else {
        draw_details(f, app, main[1]);
    }

    draw_status_bar(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect, header_height: u16) {
    let banner = cached_banner();
    let name = app
        .session
        .store()
        .summary()
        .map(|s| s.workflow.name.clone())
        .unwrap_or_else(|| app.session.store().workflow_id().to_string());

    let badge = if app.session.is_live() {
        Span::styled(
            " LIVE ",
            Style::default()
                .fg(Color::Black)
                .bg(rgb(Tone::Running.border()))
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" idle ", Style::default().fg(Color::DarkGray))
    };

    let title = Line::from(vec![
        Span::styled(
            " FLOWWATCH",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(name, Style::default().fg(Color::White)),
        Span::raw("  "),
        badge,
    ]);

    let lines: Vec<Line> = if header_height > 2 {
        let mut lines: Vec<Line> = banner
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan))))
            .collect();
        lines.pop();
        lines.push(title);
        lines
    } else {
        vec![title]
    };

    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(widget, area);
}

fn draw_runs(f: &mut Frame, app: &App, area: Rect) {
    let store = app.session.store();
    let selected = store.selected_run();
    let mut lines: Vec<Line> = Vec::new();

    match store.summary() {
        Some(summary) if !summary.recent_runs.is_empty() => {
            for (idx, run) in summary.recent_runs.iter().enumerate() {
                let marker = if Some(&run.id) == selected { "▶" } else { " " };
                let tone = Tone::of_run(&run.status);
                let duration = match run.duration_secs() {
                    Some(secs) if run.status.is_terminal() => format!(" {secs}s"),
                    _ => String::new(),
                };
                let mut style = Style::default();
                if app.focus == Focus::Runs && idx == app.run_cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                lines.push(Line::from(vec![
                    Span::styled(format!("{marker} "), style),
                    Span::styled("● ", style.fg(rgb(tone.border()))),
                    Span::styled(format!("{} ", run.id.short()), style),
                    Span::styled(run.status.to_string(), style.fg(rgb(tone.border()))),
                    Span::styled(duration, style.fg(Color::DarkGray)),
                ]));
                if let Some(started) = run.started_at {
                    lines.push(Line::from(Span::styled(
                        format!("    {started}"),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
        }
        Some(_) => lines.push(Line::from(Span::styled(
            "No runs yet",
            Style::default().fg(Color::DarkGray),
        ))),
        None => lines.push(Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let widget = Paragraph::new(lines).block(focused_block(" Runs ", app.focus == Focus::Runs));
    f.render_widget(widget, area);
}

fn focused_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn draw_graph(f: &mut Frame, app: &App, graph: &AnnotatedGraph, area: Rect) {
    let block = focused_block(" Graph ", app.focus == Focus::Nodes);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if graph.nodes.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled(
                "No workflow version",
                Style::default().fg(Color::DarkGray),
            )),
            inner,
        );
        return;
    }

    // Edges are listed along the bottom; nodes use the rest.
    let edge_rows = (graph.edges().len() as u16).min(inner.height / 3);
    let canvas = Rect {
        height: inner.height.saturating_sub(edge_rows),
        ..inner
    };
    let edges_area = Rect {
        y: canvas.y + canvas.height,
        height: edge_rows,
        ..inner
    };

    let placements = layout_nodes(graph, canvas);
    let cursor_id = app.cursor_node().map(|n| n.id.as_str());
    for (node, rect) in graph.nodes.iter().zip(placements) {
        if let Some(rect) = rect {
            let under_cursor = app.focus == Focus::Nodes && cursor_id == Some(node.node.id.as_str());
            draw_node(f, node, rect, under_cursor);
        }
    }

    let edge_lines: Vec<Line> = graph
        .edges()
        .iter()
        .map(|e| {
            let label = |id: &str| {
                graph
                    .node(id)
                    .map(|n| n.node.label().to_string())
                    .unwrap_or_else(|| id.to_string())
            };
            Line::from(Span::styled(
                format!("{} → {}", label(&e.source), label(&e.target)),
                Style::default().fg(Color::DarkGray),
            ))
        })
        .collect();
    f.render_widget(Paragraph::new(edge_lines), edges_area);
}

/// Scale canvas positions into `area`. Nodes that cannot fit are skipped.
fn layout_nodes(graph: &AnnotatedGraph, area: Rect) -> Vec<Option<Rect>> {
    if area.width < NODE_WIDTH || area.height < NODE_HEIGHT {
        return vec![None; graph.nodes.len()];
    }
    let xs = graph.nodes.iter().map(|n| n.node.position.x);
    let ys = graph.nodes.iter().map(|n| n.node.position.y);
    let (min_x, max_x) = xs.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (min_y, max_y) = ys.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let span_x = f64::from(area.width - NODE_WIDTH);
    let span_y = f64::from(area.height - NODE_HEIGHT);
    let scale = |v: f64, lo: f64, hi: f64, span: f64| {
        if hi > lo {
            ((v - lo) / (hi - lo) * span).round() as u16
        } else {
            0
        }
    };

    let mut taken: Vec<Rect> = Vec::new();
    graph
        .nodes
        .iter()
        .map(|n| {
            let rect = Rect {
                x: area.x + scale(n.node.position.x, min_x, max_x, span_x),
                y: area.y + scale(n.node.position.y, min_y, max_y, span_y),
                width: NODE_WIDTH,
                height: NODE_HEIGHT,
            };
            if taken.iter().any(|t| t.intersects(rect)) {
                return None;
            }
            taken.push(rect);
            Some(rect)
        })
        .collect()
}

fn draw_node(f: &mut Frame, node: &AnnotatedNode, rect: Rect, under_cursor: bool) {
    let token = node.style;
    let border_type = if node.highlighted {
        BorderType::Thick
    } else if token.glow.is_some() {
        BorderType::Double
    } else {
        BorderType::Rounded
    };
    let mut border_style = Style::default().fg(rgb(token.border));
    if token.glow.is_some() {
        border_style = border_style.add_modifier(Modifier::BOLD);
    }
    let mut title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
    if under_cursor {
        title_style = title_style.add_modifier(Modifier::UNDERLINED);
    }

    let status = node
        .status
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "not run".to_string());
    let body = vec![
        Line::from(Span::styled(node.node.label().to_string(), title_style)),
        Line::from(Span::styled(status, Style::default().fg(Color::DarkGray))),
    ];

    let widget = Paragraph::new(body)
        .style(Style::default().bg(rgb(token.background)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(border_type)
                .border_style(border_style),
        );
    f.render_widget(Clear, rect);
    f.render_widget(widget, rect);
}

fn draw_details(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);

    if let Some(record) = app.session.store().record() {
        let tone = Tone::of_run(&record.status);
        lines.push(Line::from(vec![
            Span::styled(format!("Run {} ", record.id.short()), heading),
            Span::styled(record.status.to_string(), Style::default().fg(rgb(tone.border()))),
        ]));
        if record.status == RunStatus::Failed {
            if let Some(err) = &record.error_message {
                lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
            }
        }
        lines.push(Line::from(""));
    }

    match (app.cursor_node(), app.cursor_execution()) {
        (Some(node), Some(ex)) => {
            let tone = Tone::of_node(&ex.status);
            let mut header = vec![
                Span::styled(format!("{} ", node.label()), heading),
                Span::styled(ex.status.to_string(), Style::default().fg(rgb(tone.border()))),
            ];
            if let Some(secs) = ex.duration_secs() {
                header.push(Span::styled(format!("  {secs}s"), dim));
            }
            lines.push(Line::from(header));

            if let Some(err) = &ex.error_message {
                lines.push(Line::from(Span::styled(
                    format!("Error: {err}"),
                    Style::default().fg(Color::Red),
                )));
            }
            if let Some(input) = &ex.input_data {
                lines.push(Line::from(Span::styled("Input", heading)));
                let pretty = serde_json::to_string_pretty(input).unwrap_or_default();
                lines.extend(
                    pretty
                        .lines()
                        .take(MAX_INPUT_LINES)
                        .map(|l| Line::from(Span::styled(l.to_string(), dim))),
                );
            }
            if let Some(output) = &ex.output_data {
                lines.push(Line::from(Span::styled("Output", heading)));
                preview_lines(&ExecutionPreview::of(output), &mut lines);
            }
        }
        (Some(node), None) => {
            lines.push(Line::from(Span::styled(node.label().to_string(), heading)));
            lines.push(Line::from(Span::styled("No execution in this run", dim)));
        }
        (None, _) => {
            lines.push(Line::from(Span::styled("Select a node to inspect", dim)));
        }
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Details "))
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn preview_lines(preview: &ExecutionPreview, lines: &mut Vec<Line<'static>>) {
    match preview {
        ExecutionPreview::Articles { count, shown } => {
            lines.push(Line::from(format!("{count} article(s)")));
            for ArticlePreview { title, error } in shown {
                lines.push(Line::from(format!("  • {title}")));
                if let Some(error) = error {
                    lines.push(Line::from(Span::styled(
                        format!("    {error}"),
                        Style::default().fg(Color::Red),
                    )));
                }
            }
        }
        ExecutionPreview::Summaries { items, combined } => {
            for (title, summary) in items {
                lines.push(Line::from(Span::styled(
                    title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(summary.clone()));
            }
            if let Some(overview) = combined {
                lines.push(Line::from(Span::styled(
                    "Combined overview",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(overview.clone()));
            }
        }
        ExecutionPreview::Raw(text) => {
            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
        }
    }
}

fn draw_output(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    match app.session.output().map(|v| &**v) {
        Some(OutputView::Structured(sections)) => {
            for section in sections {
                let title_style = match section.kind {
                    SectionKind::Summary => Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                    SectionKind::CombinedOverview => Style::default()
                        .fg(rgb(Tone::Success.border()))
                        .add_modifier(Modifier::BOLD),
                };
                lines.push(Line::from(Span::styled(section.title.clone(), title_style)));
                if !section.body.is_empty() {
                    lines.push(Line::from(section.body.clone()));
                }
                for point in &section.key_points {
                    lines.push(Line::from(format!("  • {point}")));
                }
                lines.push(Line::from(""));
            }
        }
        Some(OutputView::Raw(text)) => {
            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
        }
        None => {}
    }

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Output (c copy, o hide) "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if let Some(notice) = app.session.notice() {
        let color = match notice.level {
            NoticeLevel::Info => rgb(Tone::Success.border()),
            NoticeLevel::Error => rgb(Tone::Failed.border()),
        };
        (format!(" {}", notice.text), Style::default().bg(color).fg(Color::Black))
    } else if let Some(err) = app.session.store().last_error() {
        (
            format!(" Engine error, showing last known state: {err}"),
            Style::default().bg(Color::Yellow).fg(Color::Black),
        )
    } else {
        let activity = if app.session.rerun_in_flight() {
            " Starting run...".to_string()
        } else if app.session.is_polling() {
            let spinner = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            format!(" {} Polling", spinner[(app.tick_count / 2) % spinner.len()])
        } else {
            String::new()
        };
        (
            format!(
                "{activity} | Tab focus | ↑↓ move | Enter select | r rerun | o output | c copy | q quit"
            ),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}

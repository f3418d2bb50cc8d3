use {
    super::renderer::{format_metric, metric_header, DisplayContext},
    crate::pipeline::{Metric, Stat},
    ratatui::{
        layout::{Constraint, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        text::{Line, Span},
        widgets::{Block, Borders, Paragraph, Row, Table},
        Frame,
    },
};

/// Rows taken by everything except table body lines: header block (3),
/// footer block (3), table borders (2) and the column header row (1)
pub const CHROME_HEIGHT: u16 = 9;

/// Number of snapshot rows that fit a terminal of the given height
pub fn visible_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_HEIGHT).max(1) as usize
}

/// Everything one frame needs, captured before drawing
pub struct Screen<'a> {
    pub stats: &'a [Stat],
    pub metrics: &'a [Metric],
    pub sort_order: Metric,
    pub entries: usize,
    pub ctx: DisplayContext,
    pub paused: bool,
    pub pipe_open: bool,
}

/// Render the main UI layout
pub fn render_layout(f: &mut Frame, area: Rect, screen: &Screen) {
    let chunks = RatLayout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Ranked table
            Constraint::Length(3), // Footer/Status
        ])
        .split(area);

    render_header(f, chunks[0]);
    render_stats_table(f, chunks[1], screen);
    render_footer(f, chunks[2], screen);
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Block::default().borders(Borders::ALL).title("topstat");

    let text = vec![Line::from(vec![
        Span::styled("q", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" quit  "),
        Span::styled("s a n r < > l d", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" sort by sum/average/seen/rate/min/max/last seen/decay  "),
        Span::styled("C", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" clear  "),
        Span::styled("P", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" pause"),
    ])];

    f.render_widget(Paragraph::new(text).block(header), area);
}

fn render_stats_table(f: &mut Frame, area: Rect, screen: &Screen) {
    let sort_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let plain_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut header_cells: Vec<Span> = screen
        .metrics
        .iter()
        .map(|metric| {
            let style = if sorts_like(*metric, screen.sort_order) {
                sort_style
            } else {
                plain_style
            };
            Span::styled(metric_header(*metric, screen.ctx.rate_unit), style)
        })
        .collect();
    header_cells.push(Span::styled("element", plain_style));
    let header = Row::new(header_cells);

    let rows: Vec<Row> = screen
        .stats
        .iter()
        .map(|stat| {
            let mut cells: Vec<String> = screen
                .metrics
                .iter()
                .map(|metric| format!("{:>10}", format_metric(*metric, stat, &screen.ctx)))
                .collect();
            cells.push(stat.element.clone());
            Row::new(cells)
        })
        .collect();

    let mut widths: Vec<Constraint> = screen.metrics.iter().map(|_| Constraint::Length(12)).collect();
    widths.push(Constraint::Min(10));

    let title = format!("Top {} by {}", screen.stats.len(), screen.sort_order);
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, screen: &Screen) {
    let (input, input_color) = if screen.pipe_open {
        ("open", Color::Green)
    } else {
        ("closed", Color::Red)
    };

    let mut spans = vec![
        Span::styled("Input: ", Style::default().fg(input_color)),
        Span::raw(input),
        Span::raw(" | "),
        Span::styled("Entries: ", Style::default().fg(Color::Cyan)),
        Span::raw(screen.entries.to_string()),
        Span::raw(" | "),
        Span::styled("Observations: ", Style::default().fg(Color::Cyan)),
        Span::raw(screen.ctx.total_seen.to_string()),
    ];
    if screen.paused {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("PAUSED", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)));
    }

    let footer = Block::default().borders(Borders::ALL).title("Status");
    f.render_widget(Paragraph::new(vec![Line::from(spans)]).block(footer), area);
}

/// Whether a displayed column is the active sort key (rate and percentage
/// rank like seen)
fn sorts_like(column: Metric, sort_order: Metric) -> bool {
    let canonical = |m: Metric| match m {
        Metric::Rate | Metric::Percentage => Metric::Seen,
        other => other,
    };
    canonical(column) == canonical(sort_order)
}

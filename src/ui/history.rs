use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use crate::{
    app::HistoryState,
    history::{PersistedResult, ResultSummary},
    stats::Grade,
};

/// Pure presenter for a single history row
pub fn present_row(record: &PersistedResult) -> Row<'static> {
    let grade = Grade::from_stats(record.wpm, record.accuracy);

    let wpm_color = if record.wpm >= 60.0 {
        Color::Green
    } else if record.wpm >= 30.0 {
        Color::Yellow
    } else {
        Color::Red
    };

    let accuracy_color = if record.accuracy >= 98.0 {
        Color::Green
    } else if record.accuracy >= 90.0 {
        Color::Yellow
    } else {
        Color::Red
    };

    Row::new(vec![
        Cell::from(record.created_at.format("%Y-%m-%d %H:%M").to_string()),
        Cell::from(format!("{:.0}", record.wpm)).style(Style::default().fg(wpm_color)),
        Cell::from(format!("{:.0}%", record.accuracy)).style(Style::default().fg(accuracy_color)),
        Cell::from(record.test_length.to_string()),
        Cell::from(grade.to_string()).style(Style::default().add_modifier(Modifier::BOLD)),
    ])
}

pub fn summary_line(summary: &ResultSummary) -> String {
    if summary.total_tests == 0 {
        return "no results yet".to_string();
    }
    format!(
        "{} tests   avg {:.0} wpm / {:.0}% acc   best {:.0} wpm / {:.0}% acc",
        summary.total_tests,
        summary.average_wpm,
        summary.average_accuracy,
        summary.best_wpm,
        summary.best_accuracy
    )
}

/// Render the history screen
pub fn render_history(history: &HistoryState, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // summary
            Constraint::Min(0),    // table
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(summary_line(&history.page.summary))
        .block(Block::default().borders(Borders::ALL).title("History"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let header = Row::new(vec!["Date", "WPM", "Acc", "Length", "Grade"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    // borders and header
    let table_height = chunks[1].height.saturating_sub(3) as usize;
    let rows: Vec<Row> = history
        .page
        .records
        .iter()
        .skip(history.scroll_offset)
        .take(table_height)
        .map(present_row)
        .collect();

    Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Recent results"))
    .render(chunks[1], buf);

    Paragraph::new("(↑/↓) scroll / (b)ack / (r)etry / (esc)ape")
        .style(Style::default().add_modifier(Modifier::ITALIC))
        .render(chunks[2], buf);
}

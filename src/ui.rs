pub mod history;
pub mod prompt;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use webbrowser::Browser;

use crate::{
    app::{App, AppState},
    session::TypingSession,
    stats::Grade,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Typing => render_typing(&self.session, area, buf),
            AppState::Results => render_results(&self.session, area, buf),
            AppState::History => history::render_history(&self.history_state, area, buf),
        }
    }
}

fn render_typing(session: &TypingSession, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_bold_style = bold_style.add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let prompt_height = prompt::VISIBLE_LINES as u16;
    let padding = area.height.saturating_sub(prompt_height + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(1), // countdown or word progress
            Constraint::Length(1),
            Constraint::Length(prompt_height),
            Constraint::Length(1), // live stats
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let progress = match session.seconds_remaining() {
        Some(remaining) => format!("{remaining:.1}"),
        None => format!(
            "{}/{}",
            session.cursor().word_index.min(session.words().len()),
            session.words().len()
        ),
    };
    Paragraph::new(Span::styled(progress, dim_bold_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let lines = prompt::prompt_lines(
        session.words(),
        session.input(),
        &session.char_outcomes(),
        // room for the trailing separator
        chunks[3].width.saturating_sub(1) as usize,
    );
    Paragraph::new(lines)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    let status = if session.is_active() {
        let stats = session.stats();
        Span::styled(
            format!("{} wpm   {}% acc", stats.wpm, stats.accuracy),
            bold_style,
        )
    } else {
        Span::styled(
            format!("start typing   {}", session.config().describe()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(Span::styled("(tab) restart / (esc)ape", italic_style))
        .alignment(Alignment::Center)
        .render(chunks[6], buf);
}

fn render_results(session: &TypingSession, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1), // grade
            Constraint::Length(1), // stats
            Constraint::Length(1), // settings
            Constraint::Min(0),
            Constraint::Length(2), // legend
        ])
        .split(area);

    let stats = session.stats();
    let grade = Grade::from_stats(stats.wpm, stats.accuracy);
    let grade_color = match grade {
        Grade::S | Grade::A => Color::Green,
        Grade::B | Grade::C => Color::Yellow,
        Grade::D | Grade::F => Color::Red,
    };
    Paragraph::new(Line::from(vec![
        Span::raw("grade "),
        Span::styled(grade.to_string(), bold_style.fg(grade_color)),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} errors   {:.1}s",
            stats.wpm, stats.accuracy, stats.error_count, stats.elapsed_time
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        session.config().describe(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let legend = if Browser::is_available() {
        "(r)etry / (m)ode / (l)ength / (p)unctuation / (n)umbers / lan(g)uage / (h)istory / (s)hare / (esc)ape"
    } else {
        "(r)etry / (m)ode / (l)ength / (p)unctuation / (n)umbers / lan(g)uage / (h)istory / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[5], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, TestConfig};
    use crate::runtime::ManualClock;
    use std::time::Duration;

    fn words_app(words: &[&str]) -> (App, ManualClock) {
        let clock = ManualClock::new();
        let config = TestConfig {
            mode: Mode::Words,
            word_count: words.len() as u32,
            ..Default::default()
        };
        let session = TypingSession::new(config)
            .unwrap()
            .with_clock(clock.clone())
            .with_words(words.iter().map(|w| w.to_string()).collect());
        (App::new(session), clock)
    }

    fn render(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_idle_screen_shows_prompt_and_settings() {
        let (app, _) = words_app(&["hello", "world"]);
        let rendered = render(&app, Rect::new(0, 0, 80, 24));

        assert!(rendered.contains("hello world"));
        assert!(rendered.contains("start typing"));
        assert!(rendered.contains("2 words | english"));
        assert!(rendered.contains("0/2"));
    }

    #[test]
    fn test_active_screen_shows_live_stats() {
        let (mut app, clock) = words_app(&["hello", "world"]);
        app.session.apply_input("h");
        clock.advance(Duration::from_secs(6));
        app.session.apply_input("hello ");

        let rendered = render(&app, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("12 wpm"));
        assert!(rendered.contains("100% acc"));
        assert!(rendered.contains("1/2"));
    }

    #[test]
    fn test_time_mode_shows_countdown() {
        let clock = ManualClock::new();
        let session = TypingSession::new(TestConfig::default())
            .unwrap()
            .with_clock(clock.clone())
            .with_seed(1);
        let mut app = App::new(session);
        let first = app.session.words()[0].clone();
        app.session.apply_input(&first);
        clock.advance(Duration::from_millis(4_500));
        app.session.tick();

        let rendered = render(&app, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("25.5"));
    }

    #[test]
    fn test_results_screen() {
        let (mut app, clock) = words_app(&["hi"]);
        app.session.apply_input("h");
        clock.advance(Duration::from_secs(1));
        app.session.apply_input("hi");
        app.state = AppState::Results;

        let rendered = render(&app, Rect::new(0, 0, 120, 24));
        assert!(rendered.contains("grade"));
        assert!(rendered.contains("24 wpm   100% acc   0 errors   1.0s"));
        assert!(rendered.contains("1 words | english"));
        assert!(rendered.contains("(r)etry"));
    }

    #[test]
    fn test_history_screen_renders() {
        let (mut app, _) = words_app(&["hi"]);
        app.open_history();

        let rendered = render(&app, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("no results yet"));
    }

    #[test]
    fn test_extreme_sizes() {
        let (app, _) = words_app(&["testing", "different", "aspect", "ratios"]);
        for area in [
            Rect::new(0, 0, 10, 5),
            Rect::new(0, 0, 200, 5),
            Rect::new(0, 0, 20, 50),
            Rect::new(0, 0, 1000, 1000),
        ] {
            let mut buffer = Buffer::empty(area);
            (&app).render(area, &mut buffer);
            assert_eq!(*buffer.area(), area);
        }
    }

    #[test]
    fn test_long_time_mode_prompt() {
        let session = TypingSession::new(TestConfig {
            time_limit: 600,
            ..Default::default()
        })
        .unwrap()
        .with_seed(2);
        let app = App::new(session);

        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        (&app).render(area, &mut buffer);
        assert_eq!(*buffer.area(), area);
    }
}

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use std::ops::Range;
use unicode_width::UnicodeWidthStr;

use crate::stats::Outcome;

/// Lines of the prompt shown at once
pub const VISIBLE_LINES: usize = 3;

/// Greedy word wrap; returns the range of word indices on each line.
/// A word wider than `width` gets a line of its own.
pub fn wrap_words<S: AsRef<str>>(words: &[S], width: usize) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut line_width = 0;

    for (idx, word) in words.iter().enumerate() {
        let w = word.as_ref().width();
        if idx > start && line_width + 1 + w > width {
            lines.push(start..idx);
            start = idx;
            line_width = w;
        } else if idx == start {
            line_width = w;
        } else {
            line_width += 1 + w;
        }
    }
    if start < words.len() {
        lines.push(start..words.len());
    }
    lines
}

/// First line to show so the caret stays on the first or second visible line
pub fn first_visible_line(lines: &[Range<usize>], word_index: usize) -> usize {
    lines
        .iter()
        .position(|line| line.contains(&word_index))
        .unwrap_or(lines.len().saturating_sub(1))
        .saturating_sub(1)
}

struct Styles {
    correct: Style,
    incorrect: Style,
    caret: Style,
    pending: Style,
}

impl Default for Styles {
    fn default() -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim_bold = bold.add_modifier(Modifier::DIM);
        Self {
            correct: bold.fg(Color::Green),
            incorrect: bold.fg(Color::Red),
            caret: dim_bold.add_modifier(Modifier::UNDERLINED),
            pending: dim_bold,
        }
    }
}

/// Styled prompt lines for the typing screen.
///
/// `typed` is the raw input and `outcomes` its classification against the
/// words joined by single spaces.
pub fn prompt_lines<'a, S: AsRef<str>>(
    words: &[S],
    typed: &str,
    outcomes: &[Outcome],
    width: usize,
) -> Vec<Line<'a>> {
    let styles = Styles::default();
    let typed: Vec<char> = typed.chars().collect();
    let caret = typed.len();

    let styled = |offset: usize, expected: char| -> Span<'a> {
        match outcomes.get(offset) {
            Some(Outcome::Correct) => Span::styled(expected.to_string(), styles.correct),
            Some(_) => Span::styled(
                match typed[offset] {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                styles.incorrect,
            ),
            None if offset == caret => Span::styled(expected.to_string(), styles.caret),
            None => Span::styled(expected.to_string(), styles.pending),
        }
    };

    let mut word_offsets = Vec::with_capacity(words.len());
    let mut offset = 0;
    for word in words {
        word_offsets.push(offset);
        offset += word.as_ref().chars().count() + 1;
    }
    let target_len = offset.saturating_sub(1);

    let lines = wrap_words(words, width.max(1));
    let current_word = crate::stats::locate_cursor(caret, words).word_index;
    let first = first_visible_line(&lines, current_word);

    lines
        .iter()
        .enumerate()
        .skip(first)
        .take(VISIBLE_LINES)
        .map(|(line_idx, range)| {
            let mut spans = Vec::new();
            for word_idx in range.clone() {
                let start = word_offsets[word_idx];
                for (i, c) in words[word_idx].as_ref().chars().enumerate() {
                    spans.push(styled(start + i, c));
                }
                let separator = start + words[word_idx].as_ref().chars().count();
                if separator < target_len {
                    spans.push(styled(separator, ' '));
                }
            }
            if line_idx + 1 == lines.len() && typed.len() > target_len {
                let extra: String = typed[target_len..].iter().collect();
                spans.push(Span::styled(extra, styles.incorrect));
            }
            Line::from(spans)
        })
        .collect()
}

use itertools::Itertools;
use serde::Serialize;

/// Standard word length used for WPM
pub const CHARS_PER_WORD: f64 = 5.0;

/// How a typed character compares to the target text
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// Typed past the end of the target text
    Extra,
}

/// One consistent snapshot of the live statistics
#[derive(Clone, Debug, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStats {
    /// Rounded words per minute
    pub wpm: f64,
    /// Rounded percentage of typed characters that were correct
    pub accuracy: f64,
    #[serde(rename = "time")]
    pub elapsed_time: f64,
    pub error_count: usize,
    pub correct_chars: usize,
    pub total_chars: usize,
    pub extra_chars: usize,
}

impl Default for TypingStats {
    fn default() -> Self {
        Self {
            wpm: 0.0,
            accuracy: 100.0,
            elapsed_time: 0.0,
            error_count: 0,
            correct_chars: 0,
            total_chars: 0,
            extra_chars: 0,
        }
    }
}

/// Caret position expressed as a word and a character within it
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub word_index: usize,
    pub char_index: usize,
}

/// The canonical text a test is scored against
pub fn target_text<S: AsRef<str>>(words: &[S]) -> String {
    words.iter().map(|w| w.as_ref()).join(" ")
}

/// Character length of the target text without building it
pub fn target_len<S: AsRef<str>>(words: &[S]) -> usize {
    let chars: usize = words.iter().map(|w| w.as_ref().chars().count()).sum();
    chars + words.len().saturating_sub(1)
}

/// Classify every typed character against the target, position by position
pub fn classify(input: &str, target: &str) -> Vec<Outcome> {
    let mut expected = target.chars();
    input
        .chars()
        .map(|typed| match expected.next() {
            Some(c) if c == typed => Outcome::Correct,
            Some(_) => Outcome::Incorrect,
            None => Outcome::Extra,
        })
        .collect()
}

pub fn wpm(correct_chars: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    (correct_chars as f64 / CHARS_PER_WORD) / (elapsed_secs / 60.0)
}

pub fn accuracy(correct_chars: usize, total_chars: usize) -> f64 {
    if total_chars == 0 {
        return 100.0;
    }
    correct_chars as f64 / total_chars as f64 * 100.0
}

/// Compute every statistic from scratch for `input` typed against `words`
/// over `elapsed_secs`
pub fn calculate<S: AsRef<str>>(input: &str, words: &[S], elapsed_secs: f64) -> TypingStats {
    let outcomes = classify(input, &target_text(words));

    let (mut correct_chars, mut incorrect, mut extra_chars) = (0, 0, 0);
    for outcome in &outcomes {
        match outcome {
            Outcome::Correct => correct_chars += 1,
            Outcome::Incorrect => incorrect += 1,
            Outcome::Extra => extra_chars += 1,
        }
    }
    let total_chars = outcomes.len();
    let elapsed_time = elapsed_secs.max(0.0);

    TypingStats {
        wpm: wpm(correct_chars, elapsed_time).round(),
        accuracy: accuracy(correct_chars, total_chars).round(),
        elapsed_time,
        error_count: incorrect + extra_chars,
        correct_chars,
        total_chars,
        extra_chars,
    }
}

/// Locate the caret after `input_len` typed characters.
///
/// The caret sits inside the word it is typing; once the separator after a
/// word is typed it moves to the start of the next word. Characters typed
/// past the end of the text leave it clamped to the end of the last word.
pub fn locate_cursor<S: AsRef<str>>(input_len: usize, words: &[S]) -> Cursor {
    let mut offset = 0;
    for (word_index, word) in words.iter().enumerate() {
        let len = word.as_ref().chars().count();
        if input_len <= offset + len {
            return Cursor {
                word_index,
                char_index: input_len - offset,
            };
        }
        offset += len + 1;
    }

    match words.last() {
        Some(last) => Cursor {
            word_index: words.len() - 1,
            char_index: last.as_ref().chars().count(),
        },
        None => Cursor::default(),
    }
}

/// Letter grade shown with the final result
#[derive(Clone, Debug, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_stats(wpm: f64, accuracy: f64) -> Self {
        if accuracy < 90.0 {
            Grade::F
        } else if wpm < 20.0 {
            Grade::D
        } else if wpm < 40.0 {
            Grade::C
        } else if wpm < 60.0 {
            Grade::B
        } else if wpm < 80.0 {
            Grade::A
        } else {
            Grade::S
        }
    }
}

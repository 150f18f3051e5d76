//! The typing session state machine.
//!
//! A [`TypingSession`] owns the words of a test, the raw input typed so far
//! and the live statistics derived from them. It is mutated through four
//! entry points only: [`TypingSession::apply_input`],
//! [`TypingSession::apply_config`], [`TypingSession::reset`] and
//! [`TypingSession::tick`]. Every mutation ends in the same recompute step
//! so cursor and stats always describe one consistent snapshot.

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::{ConfigError, ConfigPatch, Mode, TestConfig};
use crate::runtime::{Clock, SystemClock, TickGuard, Ticker, TICK_RATE_MS};
use crate::stats::{self, Cursor, Outcome, TypingStats};
use crate::word_generator;

/// Final score handed to the persistence collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub wpm: f64,
    pub accuracy: f64,
    /// Seconds in time mode, words in words mode
    pub test_length: u32,
}

/// Receives the result of every completed session
pub trait ResultSink {
    fn submit(&mut self, result: &TestResult) -> Result<(), Box<dyn Error>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for the first keystroke
    Idle,
    /// Timer running
    Active,
    /// Terminal until the next reset
    Completed,
}

/// Everything a renderer needs, in one serializable value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub words: Vec<String>,
    pub input: String,
    pub current_word_index: usize,
    pub current_char_index: usize,
    pub is_active: bool,
    pub is_completed: bool,
    pub stats: TypingStats,
}

pub struct TypingSession {
    config: TestConfig,
    words: Vec<String>,
    input: String,
    cursor: Cursor,
    phase: Phase,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    stats: TypingStats,
    clock: Box<dyn Clock>,
    rng: StdRng,
    ticker: Ticker,
    tick_guard: Option<TickGuard>,
    result_sink: Option<Box<dyn ResultSink>>,
}

impl fmt::Debug for TypingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingSession")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("input", &self.input)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TypingSession {
    pub fn new(config: TestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut session = Self {
            config,
            words: Vec::new(),
            input: String::new(),
            cursor: Cursor::default(),
            phase: Phase::Idle,
            started_at: None,
            finished_at: None,
            stats: TypingStats::default(),
            clock: Box::new(SystemClock),
            rng: StdRng::from_entropy(),
            ticker: Ticker::new(),
            tick_guard: None,
            result_sink: None,
        };
        session.reset();
        Ok(session)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Share `ticker` with whoever drives [`TypingSession::tick`]
    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.tick_guard = None;
        self.ticker = ticker;
        self
    }

    pub fn with_result_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.result_sink = Some(Box::new(sink));
        self
    }

    /// Reseed the word generator and start over with fresh words
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.reset();
        self
    }

    /// Replace the generated words until the next reset
    pub fn with_words(mut self, words: Vec<String>) -> Self {
        self.reset();
        self.words = words;
        self.recompute();
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn stats(&self) -> &TypingStats {
        &self.stats
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Countdown for time mode; `None` in words mode
    pub fn seconds_remaining(&self) -> Option<f64> {
        match self.config.mode {
            Mode::Time => Some((self.config.time_limit as f64 - self.elapsed_secs()).max(0.0)),
            Mode::Words => None,
        }
    }

    /// Outcome of every typed character, in input order
    pub fn char_outcomes(&self) -> Vec<Outcome> {
        stats::classify(&self.input, &stats::target_text(&self.words))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            words: self.words.clone(),
            input: self.input.clone(),
            current_word_index: self.cursor.word_index,
            current_char_index: self.cursor.char_index,
            is_active: self.is_active(),
            is_completed: self.is_completed(),
            stats: self.stats,
        }
    }

    /// The score of a completed session
    pub fn result(&self) -> Option<TestResult> {
        self.is_completed().then(|| TestResult {
            wpm: self.stats.wpm,
            accuracy: self.stats.accuracy,
            test_length: self.config.test_length(),
        })
    }

    /// Feed the whole input buffer as it currently stands.
    ///
    /// Ignored once the session is completed. A buffer shorter than the
    /// stored input is ignored too: input only grows until the next reset.
    pub fn apply_input(&mut self, raw: &str) {
        if self.phase == Phase::Completed {
            log::debug!("ignoring input after completion");
            return;
        }
        if raw.chars().count() < self.input.chars().count() {
            log::debug!("ignoring shrinking input snapshot");
            return;
        }

        self.input.clear();
        self.input.push_str(raw);

        if self.phase == Phase::Idle && !self.input.is_empty() {
            self.start();
        }

        self.recompute();
        self.check_completion();
    }

    /// Merge `patch` into the config. Any effective change resets the
    /// session; an invalid result is rejected and the old config kept.
    pub fn apply_config(&mut self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        let merged = self.config.merged(patch)?;
        if merged == self.config {
            return Ok(());
        }

        log::info!("config changed to {}", merged.describe());
        self.config = merged;
        self.reset();
        Ok(())
    }

    /// Back to idle with fresh words; callable from any state
    pub fn reset(&mut self) {
        if self.phase == Phase::Active {
            log::debug!("abandoning active session");
        }
        self.tick_guard = None;
        self.input.clear();
        self.phase = Phase::Idle;
        self.started_at = None;
        self.finished_at = None;
        self.words = word_generator::generate(&self.config, &mut self.rng);
        self.recompute();
    }

    /// Periodic refresh while active; a no-op in any other phase
    pub fn tick(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        self.recompute();
        self.check_completion();
    }

    fn start(&mut self) {
        self.phase = Phase::Active;
        self.started_at = Some(self.clock.now());
        self.tick_guard = Some(self.ticker.acquire(Duration::from_millis(TICK_RATE_MS)));
        log::debug!("session started: {}", self.config.describe());
    }

    fn elapsed_secs(&self) -> f64 {
        match self.started_at {
            Some(start) => {
                let end = self.finished_at.unwrap_or_else(|| self.clock.now());
                end.saturating_duration_since(start).as_secs_f64()
            }
            None => 0.0,
        }
    }

    fn recompute(&mut self) {
        self.cursor = stats::locate_cursor(self.input.chars().count(), &self.words);
        self.stats = stats::calculate(&self.input, &self.words, self.elapsed_secs());
    }

    fn check_completion(&mut self) {
        let done = match self.config.mode {
            Mode::Time => self.elapsed_secs() >= self.config.time_limit as f64,
            Mode::Words => self.input.chars().count() >= stats::target_len(&self.words),
        };
        if done {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let now = self.clock.now();
        let finished_at = match (self.config.mode, self.started_at) {
            // ticks are coarse; score a timed test over exactly its limit
            (Mode::Time, Some(start)) => {
                now.min(start + Duration::from_secs(self.config.time_limit as u64))
            }
            _ => now,
        };
        self.finished_at = Some(finished_at);
        self.phase = Phase::Completed;
        self.tick_guard = None;
        self.recompute();

        let Some(result) = self.result() else {
            return;
        };
        log::info!(
            "session completed: {} wpm, {}% acc over {}",
            result.wpm,
            result.accuracy,
            self.config.describe()
        );
        if let Some(sink) = self.result_sink.as_mut() {
            if let Err(e) = sink.submit(&result) {
                log::warn!("failed to store result: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::SupportedLanguage;
    use crate::runtime::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingSink {
        results: Rc<RefCell<Vec<TestResult>>>,
    }

    impl ResultSink for RecordingSink {
        fn submit(&mut self, result: &TestResult) -> Result<(), Box<dyn Error>> {
            self.results.borrow_mut().push(*result);
            Ok(())
        }
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn submit(&mut self, _result: &TestResult) -> Result<(), Box<dyn Error>> {
            Err("database is locked".into())
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn words_config(count: u32) -> TestConfig {
        TestConfig {
            mode: Mode::Words,
            word_count: count,
            ..Default::default()
        }
    }

    fn session(config: TestConfig) -> (TypingSession, ManualClock, RecordingSink) {
        let clock = ManualClock::new();
        let sink = RecordingSink::default();
        let session = TypingSession::new(config)
            .unwrap()
            .with_clock(clock.clone())
            .with_result_sink(sink.clone())
            .with_seed(11);
        (session, clock, sink)
    }

    #[test]
    fn test_new_session_is_idle() {
        let (s, _, _) = session(words_config(10));

        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.is_active());
        assert!(!s.is_completed());
        assert_eq!(s.words().len(), 10);
        assert_eq!(s.input(), "");
        assert_eq!(s.cursor(), Cursor::default());
        assert_eq!(*s.stats(), TypingStats::default());
        assert!(!s.ticker().is_armed());
        assert!(s.result().is_none());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = TestConfig {
            time_limit: 0,
            ..Default::default()
        };
        assert_eq!(
            TypingSession::new(config).unwrap_err(),
            ConfigError::NonPositiveTimeLimit
        );
    }

    #[test]
    fn test_first_input_starts_session() {
        let (mut s, _, _) = session(words_config(5));

        s.apply_input("");
        assert_eq!(s.phase(), Phase::Idle);

        let first = s.words()[0].chars().next().unwrap().to_string();
        s.apply_input(&first);
        assert_eq!(s.phase(), Phase::Active);
        assert!(s.ticker().is_armed());
        assert_eq!(s.stats().correct_chars, 1);
    }

    #[test]
    fn test_reference_scenario_completes_words_mode() {
        let (mut s, clock, sink) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));

        s.apply_input("t");
        clock.advance(Duration::from_secs(6));
        s.apply_input("the cat sag");

        assert!(s.is_completed());
        let stats = s.stats();
        assert_eq!(stats.correct_chars, 10);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.accuracy, 91.0);
        assert_eq!(stats.wpm, 20.0);
        assert_eq!(stats.elapsed_time, 6.0);

        assert_eq!(
            *sink.results.borrow(),
            vec![TestResult {
                wpm: 20.0,
                accuracy: 91.0,
                test_length: 3,
            }]
        );
    }

    #[test]
    fn test_exact_correct_input_completes_words_mode() {
        let (mut s, clock, _) = session(words_config(4));
        let target = stats::target_text(s.words());

        let (head, _) = target.split_at(1);
        s.apply_input(head);
        clock.advance(Duration::from_secs(2));
        s.apply_input(&target[..target.len() - 1]);
        assert!(s.is_active());

        s.apply_input(&target);
        assert!(s.is_completed());
        assert!(!s.is_active());
        assert_eq!(s.stats().accuracy, 100.0);
        assert_eq!(s.stats().error_count, 0);
        assert!(!s.ticker().is_armed());
    }

    #[test]
    fn test_cursor_follows_input() {
        let (mut s, _, _) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));

        s.apply_input("th");
        assert_eq!(s.cursor(), Cursor { word_index: 0, char_index: 2 });
        s.apply_input("the ");
        assert_eq!(s.cursor(), Cursor { word_index: 1, char_index: 0 });
        s.apply_input("the ca");
        assert_eq!(s.snapshot().current_word_index, 1);
        assert_eq!(s.snapshot().current_char_index, 2);
    }

    #[test]
    fn test_input_after_completion_is_ignored() {
        let (mut s, _, sink) = session(words_config(1));
        s = s.with_words(words(&["go"]));

        s.apply_input("go");
        assert!(s.is_completed());
        let before = s.snapshot();

        s.apply_input("go more");
        s.tick();
        assert_eq!(s.snapshot(), before);
        assert_eq!(sink.results.borrow().len(), 1);
    }

    #[test]
    fn test_shrinking_input_is_ignored() {
        let (mut s, _, _) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));

        s.apply_input("the c");
        s.apply_input("the");
        assert_eq!(s.input(), "the c");

        // same length, different content is stored verbatim
        s.apply_input("thx c");
        assert_eq!(s.input(), "thx c");
        assert_eq!(s.stats().error_count, 1);
    }

    #[test]
    fn test_incorrect_characters_stay_in_the_stream() {
        let (mut s, _, _) = session(words_config(2));
        s = s.with_words(words(&["ab", "cd"]));

        s.apply_input("xb");
        assert_eq!(s.input(), "xb");
        assert_eq!(s.char_outcomes(), vec![Outcome::Incorrect, Outcome::Correct]);
        assert_eq!(s.stats().total_chars, 2);
    }

    #[test]
    fn test_extra_characters_do_not_break_words_mode() {
        let (mut s, _, sink) = session(words_config(1));
        s = s.with_words(words(&["hi"]));

        // one snapshot jumping past the end of the text
        s.apply_input("hi there");
        assert!(s.is_completed());
        assert_eq!(s.stats().extra_chars, 6);
        assert_eq!(s.stats().error_count, 6);
        assert_eq!(s.cursor(), Cursor { word_index: 0, char_index: 2 });
        assert_eq!(sink.results.borrow().len(), 1);
    }

    #[test]
    fn test_extra_characters_in_time_mode() {
        let (mut s, _, _) = session(TestConfig::default());
        s = s.with_words(words(&["a", "b"]));

        s.apply_input("a b c d");
        assert!(s.is_active());
        assert_eq!(s.stats().extra_chars, 4);
        assert_eq!(s.char_outcomes()[4], Outcome::Extra);
        assert_eq!(s.cursor(), Cursor { word_index: 1, char_index: 1 });
    }

    #[test]
    fn test_time_mode_completes_on_tick() {
        let config = TestConfig {
            time_limit: 15,
            ..Default::default()
        };
        let (mut s, clock, sink) = session(config);
        let word = s.words()[0].clone();

        s.apply_input(&word);
        assert_eq!(s.seconds_remaining(), Some(15.0));

        clock.advance(Duration::from_secs(10));
        s.tick();
        assert!(s.is_active());
        assert_eq!(s.seconds_remaining(), Some(5.0));

        clock.advance(Duration::from_millis(5_050));
        s.tick();
        assert!(s.is_completed());
        assert!(!s.ticker().is_armed());
        assert_eq!(s.seconds_remaining(), Some(0.0));
        // scored over exactly the limit
        assert_eq!(s.stats().elapsed_time, 15.0);

        let results = sink.results.borrow();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].test_length, 15);
    }

    #[test]
    fn test_time_mode_completes_on_late_input() {
        let config = TestConfig {
            time_limit: 15,
            ..Default::default()
        };
        let (mut s, clock, _) = session(config);
        let target = stats::target_text(s.words());

        s.apply_input(&target[..1]);
        clock.advance(Duration::from_secs(16));
        s.apply_input(&target[..2]);
        assert!(s.is_completed());
    }

    #[test]
    fn test_stats_refresh_on_tick() {
        let (mut s, clock, _) = session(TestConfig::default());
        s = s.with_words(words(&["hello", "world"]));

        s.apply_input("hello");
        assert_eq!(s.stats().wpm, 0.0);

        clock.advance(Duration::from_secs(6));
        s.tick();
        // 5 correct chars in 6s
        assert_eq!(s.stats().wpm, 10.0);
        assert_eq!(s.stats().elapsed_time, 6.0);
    }

    #[test]
    fn test_tick_is_noop_unless_active() {
        let (mut s, clock, sink) = session(TestConfig::default());
        clock.advance(Duration::from_secs(100));

        s.tick();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(*s.stats(), TypingStats::default());
        assert!(sink.results.borrow().is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (mut s, _, _) = session(words_config(7));
        let first = s.words()[0].clone();
        s.apply_input(&first);
        assert!(s.is_active());

        s.reset();
        s.reset();

        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.input(), "");
        assert_eq!(s.words().len(), 7);
        assert_eq!(*s.stats(), TypingStats::default());
        assert!(!s.ticker().is_armed());
    }

    #[test]
    fn test_reset_mid_session_submits_nothing() {
        let (mut s, clock, sink) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));

        s.apply_input("the ca");
        clock.advance(Duration::from_secs(3));
        s.reset();

        assert!(sink.results.borrow().is_empty());
        assert_ne!(s.words(), words(&["the", "cat", "sat"]).as_slice());
    }

    #[test]
    fn test_config_change_while_active_resets() {
        let config = TestConfig {
            time_limit: 30,
            ..Default::default()
        };
        let (mut s, _, sink) = session(config);
        let first = s.words()[0].clone();
        s.apply_input(&first);
        assert!(s.is_active());

        s.apply_config(&ConfigPatch {
            time_limit: Some(60),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(s.config().time_limit, 60);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.is_active());
        assert_eq!(s.input(), "");
        assert!(!s.ticker().is_armed());
        assert!(sink.results.borrow().is_empty());
    }

    #[test]
    fn test_each_config_field_triggers_reset() {
        let patches = [
            ConfigPatch {
                mode: Some(Mode::Time),
                ..Default::default()
            },
            ConfigPatch {
                word_count: Some(12),
                ..Default::default()
            },
            ConfigPatch {
                include_punctuation: Some(true),
                ..Default::default()
            },
            ConfigPatch {
                include_numbers: Some(true),
                ..Default::default()
            },
            ConfigPatch {
                language: Some(SupportedLanguage::Spanish),
                ..Default::default()
            },
        ];

        for patch in patches {
            let (mut s, _, _) = session(words_config(5));
            s = s.with_words(words(&["zz"]));
            s.apply_input("z");

            s.apply_config(&patch).unwrap();
            assert_eq!(s.phase(), Phase::Idle, "{patch:?}");
            assert_eq!(s.input(), "", "{patch:?}");
            assert_ne!(s.words(), words(&["zz"]).as_slice(), "{patch:?}");
        }
    }

    #[test]
    fn test_language_change_uses_new_corpus() {
        let (mut s, _, _) = session(words_config(50));
        s.apply_config(&ConfigPatch {
            language: Some(SupportedLanguage::Spanish),
            ..Default::default()
        })
        .unwrap();

        let spanish = SupportedLanguage::Spanish.as_lang();
        assert!(s.words().iter().all(|w| spanish.words.contains(w)));
    }

    #[test]
    fn test_unchanged_config_keeps_session() {
        let (mut s, _, _) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));
        s.apply_input("th");

        s.apply_config(&ConfigPatch {
            word_count: Some(3),
            ..Default::default()
        })
        .unwrap();
        s.apply_config(&ConfigPatch::default()).unwrap();

        assert!(s.is_active());
        assert_eq!(s.input(), "th");
    }

    #[test]
    fn test_invalid_config_is_rejected_and_prior_kept() {
        let (mut s, _, _) = session(words_config(3));
        s = s.with_words(words(&["the", "cat", "sat"]));
        s.apply_input("th");

        let err = s
            .apply_config(&ConfigPatch {
                word_count: Some(0),
                mode: Some(Mode::Time),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err, ConfigError::NonPositiveWordCount);
        assert_eq!(*s.config(), words_config(3));
        assert!(s.is_active());
        assert_eq!(s.words(), words(&["the", "cat", "sat"]).as_slice());
    }

    #[test]
    fn test_failing_sink_keeps_local_stats() {
        let clock = ManualClock::new();
        let mut s = TypingSession::new(words_config(1))
            .unwrap()
            .with_clock(clock.clone())
            .with_result_sink(FailingSink)
            .with_words(words(&["ok"]));

        s.apply_input("o");
        clock.advance(Duration::from_secs(1));
        s.apply_input("ok");

        assert!(s.is_completed());
        assert_eq!(s.stats().accuracy, 100.0);
        assert_eq!(s.stats().wpm, 24.0);
        assert_eq!(
            s.result(),
            Some(TestResult {
                wpm: 24.0,
                accuracy: 100.0,
                test_length: 1,
            })
        );
    }

    #[test]
    fn test_stats_frozen_after_completion() {
        let (mut s, clock, _) = session(words_config(1));
        s = s.with_words(words(&["go"]));

        s.apply_input("g");
        clock.advance(Duration::from_secs(2));
        s.apply_input("go");
        let frozen = *s.stats();

        clock.advance(Duration::from_secs(30));
        s.tick();
        assert_eq!(*s.stats(), frozen);
        assert_eq!(s.stats().elapsed_time, 2.0);
    }

    #[test]
    fn test_dropping_session_disarms_ticker() {
        let ticker = Ticker::new();
        let mut s = TypingSession::new(TestConfig::default())
            .unwrap()
            .with_ticker(ticker.clone());
        let first = s.words()[0].clone();
        s.apply_input(&first);
        assert!(ticker.is_armed());

        drop(s);
        assert!(!ticker.is_armed());
    }

    #[test]
    fn test_words_mode_has_no_countdown() {
        let (s, _, _) = session(words_config(3));
        assert_eq!(s.seconds_remaining(), None);
    }

    #[test]
    fn test_snapshot_serializes_for_renderers() {
        let (mut s, _, _) = session(words_config(2));
        s = s.with_words(words(&["ab", "cd"]));
        s.apply_input("ab");

        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["words"][1], "cd");
        assert_eq!(json["input"], "ab");
        assert_eq!(json["currentWordIndex"], 0);
        assert_eq!(json["currentCharIndex"], 2);
        assert_eq!(json["isActive"], true);
        assert_eq!(json["isCompleted"], false);
        assert_eq!(json["stats"]["accuracy"], 100.0);
        assert_eq!(json["stats"]["errorCount"], 0);
    }
}

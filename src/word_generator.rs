use rand::seq::SliceRandom;
use rand::Rng;

use crate::{
    config::{Mode, TestConfig},
    language::Language,
};

/// Chance that a word gets a trailing punctuation mark
pub const PUNCTUATION_PROBABILITY: f64 = 0.3;
/// Chance that a word gets a digit spliced onto it
pub const NUMBER_PROBABILITY: f64 = 0.2;
/// Chance that a spliced digit goes in front of the word rather than after it
pub const NUMBER_PREFIX_PROBABILITY: f64 = 0.5;

/// Minimum number of words generated for a timed test
pub const MIN_TIMED_POOL: usize = 200;
/// Fastest typing rate a timed pool is sized for
pub const MAX_PLAUSIBLE_WPM: u32 = 250;

const PUNCTUATION_MARKS: [char; 11] = [',', '.', '!', '?', ';', ':', '"', '\'', '(', ')', '-'];
const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Generates the words of a test from a config and a random source
pub struct WordGenerator<'a> {
    config: &'a TestConfig,
    language: Language,
}

impl<'a> WordGenerator<'a> {
    pub fn new(config: &'a TestConfig) -> Self {
        Self {
            config,
            language: config.language.as_lang(),
        }
    }

    /// Use an explicit corpus instead of the one named by the config
    pub fn with_language(config: &'a TestConfig, language: Language) -> Self {
        Self { config, language }
    }

    /// Number of words a test with this config needs
    pub fn word_count(&self) -> usize {
        match self.config.mode {
            Mode::Words => self.config.word_count as usize,
            Mode::Time => {
                let scaled =
                    (self.config.time_limit as usize * MAX_PLAUSIBLE_WPM as usize).div_ceil(60);
                scaled.max(MIN_TIMED_POOL)
            }
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        (0..self.word_count())
            .map(|_| self.next_word(rng))
            .collect()
    }

    fn next_word<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut word = self.language.random_word(rng).to_string();

        if self.config.include_punctuation && rng.gen_bool(PUNCTUATION_PROBABILITY) {
            if let Some(mark) = PUNCTUATION_MARKS.choose(rng) {
                word.push(*mark);
            }
        }

        if self.config.include_numbers && rng.gen_bool(NUMBER_PROBABILITY) {
            if let Some(digit) = DIGITS.choose(rng) {
                if rng.gen_bool(NUMBER_PREFIX_PROBABILITY) {
                    word.insert(0, *digit);
                } else {
                    word.push(*digit);
                }
            }
        }

        word
    }
}

/// Generate the word sequence for `config`
pub fn generate<R: Rng + ?Sized>(config: &TestConfig, rng: &mut R) -> Vec<String> {
    WordGenerator::new(config).generate(rng)
}

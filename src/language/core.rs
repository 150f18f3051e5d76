use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::error::Error;

use crate::config::ConfigError;

static LANG_DIR: Dir = include_dir!("src/lang");

/// A word corpus embedded in the binary
#[derive(Deserialize, Clone, Debug)]
pub struct Language {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

/// Corpora a test can draw its words from
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SupportedLanguage {
    #[default]
    English,
    Spanish,
}

impl SupportedLanguage {
    pub const ALL: [SupportedLanguage; 2] = [SupportedLanguage::English, SupportedLanguage::Spanish];

    /// Parse a language identifier such as `"english"`
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.to_string() == id.trim().to_lowercase())
            .ok_or_else(|| ConfigError::UnknownLanguage(id.to_string()))
    }

    /// The language after this one, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|l| *l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn as_lang(&self) -> Language {
        Language::new(self.to_string())
    }
}

impl Language {
    pub fn new(file_name: String) -> Self {
        read_language_from_file(format!("{file_name}.json")).expect("embedded corpus is valid")
    }

    /// Draw one word uniformly at random, repetition allowed
    pub fn random_word<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.words.choose(rng).map(String::as_str).unwrap_or("the")
    }
}

fn read_language_from_file(file_name: String) -> Result<Language, Box<dyn Error>> {
    let file = LANG_DIR
        .get_file(&file_name)
        .ok_or_else(|| format!("language file not found: {file_name}"))?;

    let file_as_str = file
        .contents_utf8()
        .ok_or("unable to interpret language file as utf-8")?;

    let lang: Language = from_str(file_as_str)?;
    if lang.words.iter().any(|w| w.is_empty() || w.contains(char::is_whitespace)) {
        return Err(format!("{file_name} contains an empty or multi-word entry").into());
    }

    Ok(lang)
}

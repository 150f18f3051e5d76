use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{app_dirs::AppDirs, language::SupportedLanguage};

pub const MAX_TIME_LIMIT_SECS: u32 = 600;
pub const MAX_WORD_COUNT: u32 = 1000;

/// Length presets offered by the results screen
pub const TIME_OPTIONS: [u32; 4] = [15, 30, 60, 120];
pub const WORD_OPTIONS: [u32; 4] = [10, 25, 50, 100];

/// Test termination policy
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Time,
    Words,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("time limit must be positive")]
    NonPositiveTimeLimit,
    #[error("word count must be positive")]
    NonPositiveWordCount,
    #[error("time limit of {0}s exceeds the maximum of 600s")]
    TimeLimitTooLarge(u32),
    #[error("word count of {0} exceeds the maximum of 1000")]
    WordCountTooLarge(u32),
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestConfig {
    pub mode: Mode,
    pub time_limit: u32,
    pub word_count: u32,
    pub include_punctuation: bool,
    pub include_numbers: bool,
    pub language: SupportedLanguage,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Time,
            time_limit: 30,
            word_count: 25,
            include_punctuation: false,
            include_numbers: false,
            language: SupportedLanguage::English,
        }
    }
}

impl TestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_limit == 0 {
            return Err(ConfigError::NonPositiveTimeLimit);
        }
        if self.word_count == 0 {
            return Err(ConfigError::NonPositiveWordCount);
        }
        if self.time_limit > MAX_TIME_LIMIT_SECS {
            return Err(ConfigError::TimeLimitTooLarge(self.time_limit));
        }
        if self.word_count > MAX_WORD_COUNT {
            return Err(ConfigError::WordCountTooLarge(self.word_count));
        }
        Ok(())
    }

    /// The active termination bound: seconds in time mode, words in words mode
    pub fn test_length(&self) -> u32 {
        match self.mode {
            Mode::Time => self.time_limit,
            Mode::Words => self.word_count,
        }
    }

    /// Apply `patch` on top of this config and validate the result
    pub fn merged(&self, patch: &ConfigPatch) -> Result<TestConfig, ConfigError> {
        let merged = TestConfig {
            mode: patch.mode.unwrap_or(self.mode),
            time_limit: patch.time_limit.unwrap_or(self.time_limit),
            word_count: patch.word_count.unwrap_or(self.word_count),
            include_punctuation: patch
                .include_punctuation
                .unwrap_or(self.include_punctuation),
            include_numbers: patch.include_numbers.unwrap_or(self.include_numbers),
            language: patch.language.unwrap_or(self.language),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Patch selecting the next length preset for the current mode
    pub fn next_length_patch(&self) -> ConfigPatch {
        match self.mode {
            Mode::Time => ConfigPatch {
                time_limit: Some(next_option(&TIME_OPTIONS, self.time_limit)),
                ..Default::default()
            },
            Mode::Words => ConfigPatch {
                word_count: Some(next_option(&WORD_OPTIONS, self.word_count)),
                ..Default::default()
            },
        }
    }

    /// Short human readable description, e.g. `30s | english | punctuation`
    pub fn describe(&self) -> String {
        let length = match self.mode {
            Mode::Time => format!("{}s", self.time_limit),
            Mode::Words => format!("{} words", self.word_count),
        };
        format!(
            "{} | {} | {} | {}",
            length,
            self.language,
            if self.include_punctuation {
                "punctuation"
            } else {
                "no punctuation"
            },
            if self.include_numbers {
                "numbers"
            } else {
                "no numbers"
            }
        )
    }
}

fn next_option(options: &[u32], current: u32) -> u32 {
    options
        .iter()
        .copied()
        .find(|o| *o > current)
        .unwrap_or(options[0])
}

/// Partial config update; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub mode: Option<Mode>,
    pub time_limit: Option<u32>,
    pub word_count: Option<u32>,
    pub include_punctuation: Option<bool>,
    pub include_numbers: Option<bool>,
    pub language: Option<SupportedLanguage>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }
}

pub trait ConfigStore {
    fn load(&self) -> TestConfig;
    fn save(&self, cfg: &TestConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path =
            AppDirs::config_path().unwrap_or_else(|| PathBuf::from("typometer_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> TestConfig {
        let Ok(bytes) = fs::read(&self.path) else {
            return TestConfig::default();
        };
        match serde_json::from_slice::<TestConfig>(&bytes) {
            Ok(cfg) if cfg.validate().is_ok() => cfg,
            Ok(cfg) => {
                log::warn!(
                    "ignoring stored config at {}: {:?}",
                    self.path.display(),
                    cfg.validate()
                );
                TestConfig::default()
            }
            Err(e) => {
                log::warn!("unable to parse {}: {e}", self.path.display());
                TestConfig::default()
            }
        }
    }

    fn save(&self, cfg: &TestConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod history;
pub mod language;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod ui;
pub mod word_generator;

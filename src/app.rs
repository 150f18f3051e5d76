use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::rc::Rc;
use webbrowser::Browser;

use crate::{
    config::{ConfigPatch, ConfigStore, Mode},
    history::{ResultPage, ResultQuery, ResultsDb, UserContext},
    session::TypingSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    History,
}

/// What the event loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug, Default)]
pub struct HistoryState {
    pub page: ResultPage,
    pub scroll_offset: usize,
}

/// Front-end state around one [`TypingSession`]
pub struct App {
    pub session: TypingSession,
    pub state: AppState,
    pub history_state: HistoryState,
    history: Option<(Rc<ResultsDb>, UserContext)>,
    config_store: Option<Box<dyn ConfigStore>>,
}

impl App {
    pub fn new(session: TypingSession) -> Self {
        Self {
            session,
            state: AppState::Typing,
            history_state: HistoryState::default(),
            history: None,
            config_store: None,
        }
    }

    /// Results database backing the history screen
    pub fn with_history(mut self, db: Rc<ResultsDb>, user: UserContext) -> Self {
        self.history = Some((db, user));
        self
    }

    /// Where settings changed on the results screen are saved
    pub fn with_config_store(mut self, store: impl ConfigStore + 'static) -> Self {
        self.config_store = Some(Box::new(store));
        self
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if key.code == KeyCode::Esc || ctrl_c {
            return Control::Quit;
        }
        if key.code == KeyCode::Tab {
            self.restart();
            return Control::Continue;
        }

        match self.state {
            AppState::Typing => {
                if let KeyCode::Char(c) = key.code {
                    self.type_char(c);
                }
            }
            AppState::Results => self.on_results_key(key.code),
            AppState::History => self.on_history_key(key.code),
        }
        Control::Continue
    }

    pub fn on_tick(&mut self) {
        self.session.tick();
        self.sync_state();
    }

    pub fn restart(&mut self) {
        self.session.reset();
        self.state = AppState::Typing;
    }

    /// Apply a settings change, persisting it when accepted
    pub fn update_config(&mut self, patch: &ConfigPatch) {
        if let Err(e) = self.session.apply_config(patch) {
            log::warn!("rejected config change: {e}");
            return;
        }
        self.state = AppState::Typing;

        if let Some(store) = &self.config_store {
            if let Err(e) = store.save(self.session.config()) {
                log::warn!("unable to save settings: {e}");
            }
        }
    }

    pub fn open_history(&mut self) {
        self.history_state = HistoryState {
            page: self.load_history(),
            scroll_offset: 0,
        };
        self.state = AppState::History;
    }

    /// Tweet intent for the finished test
    pub fn share_url(&self) -> Option<String> {
        let result = self.session.result()?;
        let length = match self.session.config().mode {
            Mode::Time => format!("{}s", result.test_length),
            Mode::Words => format!("{}%20words", result.test_length),
        };
        Some(format!(
            "https://twitter.com/intent/tweet?text={}%20wpm%20%2F%20{}%25%20acc%20%2F%20{}%20on%20typometer",
            result.wpm, result.accuracy, length
        ))
    }

    fn type_char(&mut self, c: char) {
        let mut next = String::with_capacity(self.session.input().len() + c.len_utf8());
        next.push_str(self.session.input());
        next.push(c);
        self.session.apply_input(&next);
        self.sync_state();
    }

    fn sync_state(&mut self) {
        if self.state == AppState::Typing && self.session.is_completed() {
            self.state = AppState::Results;
        }
    }

    fn on_results_key(&mut self, code: KeyCode) {
        let config = self.session.config();
        let patch = match code {
            KeyCode::Char('r') => return self.restart(),
            KeyCode::Char('h') => return self.open_history(),
            KeyCode::Char('s') => return self.share(),
            KeyCode::Char('m') => ConfigPatch {
                mode: Some(match config.mode {
                    Mode::Time => Mode::Words,
                    Mode::Words => Mode::Time,
                }),
                ..Default::default()
            },
            KeyCode::Char('l') => config.next_length_patch(),
            KeyCode::Char('p') => ConfigPatch {
                include_punctuation: Some(!config.include_punctuation),
                ..Default::default()
            },
            KeyCode::Char('n') => ConfigPatch {
                include_numbers: Some(!config.include_numbers),
                ..Default::default()
            },
            KeyCode::Char('g') => ConfigPatch {
                language: Some(config.language.next()),
                ..Default::default()
            },
            _ => return,
        };
        self.update_config(&patch);
    }

    fn on_history_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.history_state.scroll_offset =
                    self.history_state.scroll_offset.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.history_state.page.records.len().saturating_sub(1);
                self.history_state.scroll_offset = (self.history_state.scroll_offset + 1).min(last);
            }
            KeyCode::Char('b') | KeyCode::Backspace => {
                self.state = if self.session.is_completed() {
                    AppState::Results
                } else {
                    AppState::Typing
                };
            }
            KeyCode::Char('r') => self.restart(),
            _ => {}
        }
    }

    fn load_history(&self) -> ResultPage {
        let Some((db, user)) = &self.history else {
            return ResultPage::default();
        };
        db.query(&user.user_id, &ResultQuery::default())
            .unwrap_or_else(|e| {
                log::warn!("unable to load history: {e}");
                ResultPage::default()
            })
    }

    fn share(&self) {
        let Some(url) = self.share_url() else {
            return;
        };
        if Browser::is_available() {
            if let Err(e) = webbrowser::open(&url) {
                log::warn!("unable to open browser: {e}");
            }
        }
    }
}

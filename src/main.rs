use chrono::NaiveDate;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    rc::Rc,
};
use typometer::{
    app::{App, Control},
    app_dirs::AppDirs,
    config::{ConfigPatch, ConfigStore, FileConfigStore, Mode},
    history::{self, HistorySink, ResultQuery, ResultsDb, UserContext, DEFAULT_QUERY_LIMIT},
    language::SupportedLanguage,
    runtime::{AppEvent, CrosstermEventSource, EventSource, Runner, Ticker},
    session::TypingSession,
    ui::history::summary_line,
};

/// typing speed test with live wpm/accuracy and per-user result history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing speed test. Type the generated words; wpm and accuracy update live, and every finished test is stored in a local history."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// end the test after a time limit or after a number of words
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// number of seconds to run a timed test
    #[clap(short = 's', long)]
    time_limit: Option<u32>,

    /// number of words in a words test
    #[clap(short = 'w', long)]
    word_count: Option<u32>,

    /// add punctuation marks to words
    #[clap(long)]
    punctuation: bool,

    /// add digits to words
    #[clap(long)]
    numbers: bool,

    /// language to pull words from
    #[clap(short = 'l', long, value_enum)]
    language: Option<SupportedLanguage>,

    /// user the results are stored for (defaults to $USER)
    #[clap(short = 'u', long, global = true)]
    user: Option<String>,

    /// seed for reproducible word sequences
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// print stored results and their summary
    History {
        /// only results on or after this day (YYYY-MM-DD)
        #[clap(long)]
        from: Option<NaiveDate>,

        /// only results on or before this day (YYYY-MM-DD)
        #[clap(long)]
        to: Option<NaiveDate>,

        /// only results of this test length
        #[clap(long)]
        length: Option<u32>,

        /// maximum number of results
        #[clap(long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,

        /// write the results as csv
        #[clap(long)]
        csv: bool,
    },
}

impl Cli {
    /// Settings given on the command line; they override stored ones for this run
    fn config_patch(&self) -> ConfigPatch {
        let implied_mode = match (self.time_limit, self.word_count) {
            (Some(_), None) => Some(Mode::Time),
            (None, Some(_)) => Some(Mode::Words),
            _ => None,
        };
        ConfigPatch {
            mode: self.mode.or(implied_mode),
            time_limit: self.time_limit,
            word_count: self.word_count,
            include_punctuation: self.punctuation.then_some(true),
            include_numbers: self.numbers.then_some(true),
            language: self.language,
        }
    }

    fn user(&self) -> UserContext {
        self.user
            .clone()
            .map(UserContext::new)
            .unwrap_or_else(UserContext::from_env)
    }

    fn history_query(&self) -> Option<(ResultQuery, bool)> {
        let Some(Command::History {
            from,
            to,
            length,
            limit,
            csv,
        }) = &self.command
        else {
            return None;
        };
        let mut query = ResultQuery {
            test_length: *length,
            limit: *limit,
            ..Default::default()
        };
        if let Some(day) = from {
            query = query.from_day(*day);
        }
        if let Some(day) = to {
            query = query.to_day(*day);
        }
        Some((query, *csv))
    }
}

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    // the terminal belongs to the ui; log to a file when one can be opened
    let file = AppDirs::log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn print_history(
    user: &UserContext,
    query: &ResultQuery,
    csv: bool,
) -> Result<(), Box<dyn Error>> {
    let db = ResultsDb::open_default()?;
    let page = db.query(&user.user_id, query)?;

    if csv {
        history::write_csv(&page.records, io::stdout())?;
        return Ok(());
    }

    println!("{}: {}", user.user_id, summary_line(&page.summary));
    for record in &page.records {
        println!(
            "{}  {:>4.0} wpm  {:>4.0}% acc  length {}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.wpm,
            record.accuracy,
            record.test_length
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let user = cli.user();
    if let Some((query, csv)) = cli.history_query() {
        return print_history(&user, &query, csv);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = match store.load().merged(&cli.config_patch()) {
        Ok(config) => config,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::ValueValidation, e).exit();
        }
    };

    let db = Rc::new(ResultsDb::open_default()?);
    let ticker = Ticker::new();
    let mut session = TypingSession::new(config)?
        .with_ticker(ticker.clone())
        .with_result_sink(HistorySink::new(Rc::clone(&db), user.clone()));
    if let Some(seed) = cli.seed {
        session = session.with_seed(seed);
    }
    let mut app = App::new(session)
        .with_history(db, user)
        .with_config_store(store);

    log::info!("starting test: {}", app.session.config().describe());

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), ticker);
    let outcome = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while let Some(event) = runner.step() {
        match event {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if app.on_key(key) == Control::Quit {
                    break;
                }
            }
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}

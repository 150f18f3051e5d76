use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Period of the live stats refresh while a test is running
pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
    /// Block until an event arrives.
    fn recv(&self) -> Result<AppEvent, RecvError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(AppEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    log::error!("terminal event stream failed: {e}");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn recv(&self) -> Result<AppEvent, RecvError> {
        self.rx.recv()
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn recv(&self) -> Result<AppEvent, RecvError> {
        self.rx.recv()
    }
}

/// Periodic tick schedule shared between a session and the runner.
///
/// The schedule is armed only while a [`TickGuard`] obtained from
/// [`Ticker::acquire`] is alive; at most one guard is held at a time.
#[derive(Clone, Debug, Default)]
pub struct Ticker {
    interval: Rc<Cell<Option<Duration>>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, interval: Duration) -> TickGuard {
        self.interval.set(Some(interval));
        TickGuard {
            slot: Rc::clone(&self.interval),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval.get()
    }

    pub fn is_armed(&self) -> bool {
        self.interval.get().is_some()
    }
}

/// Keeps a [`Ticker`] armed; dropping it cancels the schedule
#[derive(Debug)]
pub struct TickGuard {
    slot: Rc<Cell<Option<Duration>>>,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.slot.set(None);
    }
}

/// Time source for sessions
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource> {
    event_source: E,
    ticker: Ticker,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, ticker: Ticker) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Returns the next event. While the ticker is armed this waits at most
    /// one interval and yields `Tick` on timeout; otherwise it blocks.
    /// `None` means the event source is gone.
    pub fn step(&self) -> Option<AppEvent> {
        match self.ticker.interval() {
            Some(interval) => match self.event_source.recv_timeout(interval) {
                Ok(ev) => Some(ev),
                Err(RecvTimeoutError::Timeout) => Some(AppEvent::Tick),
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.event_source.recv().ok(),
        }
    }
}

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use rusqlite::{params, params_from_iter, types::Value, Connection};
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::session::{ResultSink, TestResult};

/// Records returned by a query when no limit is given
pub const DEFAULT_QUERY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid result: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Identity of whoever is taking tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The login name from the environment, or `anonymous`
    pub fn from_env() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "anonymous".to_string());
        Self::new(user)
    }
}

/// A stored test result; never modified after insertion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedResult {
    pub id: i64,
    pub user_id: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub test_length: u32,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultQuery {
    pub date_from: Option<DateTime<Local>>,
    pub date_to: Option<DateTime<Local>>,
    pub test_length: Option<u32>,
    pub limit: usize,
}

impl Default for ResultQuery {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            test_length: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl ResultQuery {
    /// Restrict to results created on or after the start of `day`
    pub fn from_day(mut self, day: NaiveDate) -> Self {
        self.date_from = day
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| Local.from_local_datetime(&dt).earliest());
        self
    }

    /// Restrict to results created on or before the end of `day`
    pub fn to_day(mut self, day: NaiveDate) -> Self {
        self.date_to = day
            .and_hms_milli_opt(23, 59, 59, 999)
            .and_then(|dt| Local.from_local_datetime(&dt).latest());
        self
    }
}

/// Aggregates over a page of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_tests: usize,
    pub average_wpm: f64,
    pub average_accuracy: f64,
    pub best_wpm: f64,
    pub best_accuracy: f64,
}

impl ResultSummary {
    pub fn from_records(records: &[PersistedResult]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let count = records.len() as f64;
        Self {
            total_tests: records.len(),
            average_wpm: records.iter().map(|r| r.wpm).sum::<f64>() / count,
            average_accuracy: records.iter().map(|r| r.accuracy).sum::<f64>() / count,
            best_wpm: records.iter().map(|r| r.wpm).fold(0.0, f64::max),
            best_accuracy: records.iter().map(|r| r.accuracy).fold(0.0, f64::max),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultPage {
    pub records: Vec<PersistedResult>,
    pub summary: ResultSummary,
}

fn validate(result: &TestResult) -> Result<()> {
    if result.wpm.is_nan() || result.wpm <= 0.0 {
        return Err(HistoryError::Invalid(format!(
            "wpm must be positive, got {}",
            result.wpm
        )));
    }
    if !(0.0..=100.0).contains(&result.accuracy) {
        return Err(HistoryError::Invalid(format!(
            "accuracy must be within 0..=100, got {}",
            result.accuracy
        )));
    }
    if result.test_length == 0 {
        return Err(HistoryError::Invalid(
            "test length must be positive".to_string(),
        ));
    }
    Ok(())
}

/// SQLite store of per-user test results
#[derive(Debug)]
pub struct ResultsDb {
    conn: Connection,
}

impl ResultsDb {
    /// Open the database at the default state location
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("typometer_results.db"));
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS typing_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                wpm REAL NOT NULL,
                accuracy REAL NOT NULL,
                test_length INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_typing_results_user ON typing_results(user_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_typing_results_created ON typing_results(created_at_ms)",
            [],
        )?;

        Ok(ResultsDb { conn })
    }

    /// Validate and store a finished test for `user_id`
    pub fn record(&self, user_id: &str, result: &TestResult) -> Result<PersistedResult> {
        self.record_at(user_id, result, Local::now())
    }

    pub fn record_at(
        &self,
        user_id: &str,
        result: &TestResult,
        created_at: DateTime<Local>,
    ) -> Result<PersistedResult> {
        validate(result)?;

        self.conn.execute(
            r#"
            INSERT INTO typing_results (user_id, wpm, accuracy, test_length, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user_id,
                result.wpm,
                result.accuracy,
                result.test_length,
                created_at.timestamp_millis(),
            ],
        )?;

        Ok(PersistedResult {
            id: self.conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            wpm: result.wpm,
            accuracy: result.accuracy,
            test_length: result.test_length,
            created_at,
        })
    }

    /// Newest-first results for `user_id` matching `query`, plus their summary
    pub fn query(&self, user_id: &str, query: &ResultQuery) -> Result<ResultPage> {
        let mut sql = String::from(
            "SELECT id, user_id, wpm, accuracy, test_length, created_at_ms \
             FROM typing_results WHERE user_id = ?",
        );
        let mut values = vec![Value::Text(user_id.to_string())];

        if let Some(from) = query.date_from {
            sql.push_str(" AND created_at_ms >= ?");
            values.push(Value::Integer(from.timestamp_millis()));
        }
        if let Some(to) = query.date_to {
            sql.push_str(" AND created_at_ms <= ?");
            values.push(Value::Integer(to.timestamp_millis()));
        }
        if let Some(length) = query.test_length {
            sql.push_str(" AND test_length = ?");
            values.push(Value::Integer(length as i64));
        }
        sql.push_str(" ORDER BY created_at_ms DESC, id DESC LIMIT ?");
        values.push(Value::Integer(query.limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let created_ms: i64 = row.get(5)?;
            let created_at = DateTime::from_timestamp_millis(created_ms)
                .ok_or_else(|| {
                    rusqlite::Error::IntegralValueOutOfRange(5, created_ms)
                })?
                .with_timezone(&Local);

            Ok(PersistedResult {
                id: row.get(0)?,
                user_id: row.get(1)?,
                wpm: row.get(2)?,
                accuracy: row.get(3)?,
                test_length: row.get(4)?,
                created_at,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        let summary = ResultSummary::from_records(&records);

        Ok(ResultPage { records, summary })
    }

    /// Remove every result of `user_id`
    pub fn clear_user(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM typing_results WHERE user_id = ?1", [user_id])?)
    }
}

/// Write `records` as CSV with a header row
pub fn write_csv<W: Write>(records: &[PersistedResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Persists finished sessions for one user
#[derive(Debug, Clone)]
pub struct HistorySink {
    db: Rc<ResultsDb>,
    user: UserContext,
}

impl HistorySink {
    pub fn new(db: Rc<ResultsDb>, user: UserContext) -> Self {
        Self { db, user }
    }
}

impl ResultSink for HistorySink {
    fn submit(&mut self, result: &TestResult) -> std::result::Result<(), Box<dyn Error>> {
        let stored = self.db.record(&self.user.user_id, result)?;
        log::info!(
            "stored result #{} for {}: {} wpm, {}% acc",
            stored.id,
            stored.user_id,
            stored.wpm,
            stored.accuracy
        );
        Ok(())
    }
}

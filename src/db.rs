//! SQLite database for test results
//!
//! Every CLI run is a session; each test result is a row tied to it.
//! Uses WAL mode so reports can be read while a run is writing.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Result, params};
use std::path::Path;

use crate::harness::{RunStatus, RunSummary, TestResult};

impl ToSql for RunStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        RunStatus::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown run status '{}'", text).into()))
    }
}

/// Database wrapper for test results
pub struct ResultDatabase {
    conn: Connection,
}

impl ResultDatabase {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                label TEXT NOT NULL,
                settings_json TEXT
            );

            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY,
                session_id TEXT REFERENCES sessions(id),
                suite TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                elapsed_ticks INTEGER NOT NULL,
                reason TEXT,
                failure_tick INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_results_session ON results(session_id);
            CREATE INDEX IF NOT EXISTS idx_results_test ON results(suite, name);
            "#,
        )?;
        Ok(())
    }

    /// Create a new session and return its ID
    pub fn create_session(&self, label: &str, settings_json: Option<&str>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.create_session_with_id(&id, label, settings_json)?;
        Ok(id)
    }

    /// Record a session under an ID chosen by the caller (shared with the JSON report)
    pub fn create_session_with_id(
        &self,
        id: &str,
        label: &str,
        settings_json: Option<&str>,
    ) -> Result<()> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (id, created_at, label, settings_json) VALUES (?1, ?2, ?3, ?4)",
            params![id, created_at, label, settings_json],
        )?;
        Ok(())
    }

    /// Insert a result and return its row ID
    pub fn insert_result(&self, session_id: &str, result: &TestResult) -> Result<i64> {
        self.conn.execute(
            r#"INSERT INTO results
               (session_id, suite, name, status, elapsed_ticks, reason, failure_tick)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                session_id,
                result.suite,
                result.name,
                result.status,
                result.elapsed_ticks as i64,
                result.failure.as_ref().map(|f| f.reason.as_str()),
                result.failure.as_ref().map(|f| f.tick as i64),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a batch of results in one transaction
    pub fn insert_results(&mut self, session_id: &str, results: &[TestResult]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO results
                   (session_id, suite, name, status, elapsed_ticks, reason, failure_tick)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for result in results {
                stmt.execute(params![
                    session_id,
                    result.suite,
                    result.name,
                    result.status,
                    result.elapsed_ticks as i64,
                    result.failure.as_ref().map(|f| f.reason.as_str()),
                    result.failure.as_ref().map(|f| f.tick as i64),
                ])?;
            }
        }
        tx.commit()
    }

    /// Get stored results with optional filtering, oldest first
    pub fn query_results(&self, filter: &ResultFilter) -> Result<Vec<StoredResult>> {
        let mut sql = String::from(
            "SELECT id, session_id, suite, name, status, elapsed_ticks, reason, failure_tick
             FROM results WHERE 1=1",
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }

        if let Some(suite) = &filter.suite {
            sql.push_str(" AND suite = ?");
            params.push(Box::new(suite.clone()));
        }

        if let Some(name) = &filter.name {
            sql.push_str(" AND name = ?");
            params.push(Box::new(name.clone()));
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status));
        }

        sql.push_str(" ORDER BY id");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(StoredResult {
                id: row.get(0)?,
                session_id: row.get(1)?,
                suite: row.get(2)?,
                name: row.get(3)?,
                status: row.get(4)?,
                elapsed_ticks: row.get::<_, i64>(5)? as u64,
                reason: row.get(6)?,
                failure_tick: row.get::<_, Option<i64>>(7)?.map(|t| t as u64),
            })
        })?;

        rows.collect()
    }

    /// Status counts for one session
    pub fn status_counts(&self, session_id: &str) -> Result<RunSummary> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM results WHERE session_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((row.get::<_, RunStatus>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = RunSummary::default();
        for row in rows {
            let (status, count) = row?;
            let count = count as usize;
            match status {
                RunStatus::Succeeded => summary.succeeded += count,
                RunStatus::Failed => summary.failed += count,
                RunStatus::TimedOut => summary.timed_out += count,
                RunStatus::Running => {}
            }
        }
        Ok(summary)
    }

    pub fn result_count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))
    }

    pub fn session_count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
    }
}

/// Filter for [`ResultDatabase::query_results`]
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub session_id: Option<String>,
    pub suite: Option<String>,
    pub name: Option<String>,
    pub status: Option<RunStatus>,
    pub limit: Option<u32>,
}

/// A result row read back from the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub session_id: String,
    pub suite: String,
    pub name: String,
    pub status: RunStatus,
    pub elapsed_ticks: u64,
    pub reason: Option<String>,
    pub failure_tick: Option<u64>,
}

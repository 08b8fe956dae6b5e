//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - The active timer record (see [`SessionStore`])
//! - Completed sessions and statistics (daily and all-time)
//! - Experience points and level
//! - Key-value store for application state

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, StoreError};
use crate::store::{SessionStore, StoredSession, ACTIVE_TIMER_KEY};
use crate::timer::TimerMode;

/// XP needed to leave each level; index 1 is the threshold out of level 1.
pub const LEVEL_THRESHOLDS: [u64; 6] = [0, 100, 300, 600, 1000, 1500];

const XP_KEY: &str = "xp";
const LEVEL_KEY: &str = "level";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub mode: String,
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub focus_sessions: u64,
    pub break_sessions: u64,
    pub breathing_sessions: u64,
    pub total_focus_min: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// Experience after an award.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub xp: u64,
    pub level: u32,
    pub gained: u64,
    pub leveled_up: bool,
}

impl Progress {
    /// Transient message announcing the award.
    pub fn message(&self) -> String {
        if self.leveled_up {
            format!("Level Up! You are now level {}", self.level)
        } else {
            format!("+{} XP gained", self.gained)
        }
    }
}

/// SQLite database for timer state, session history and rewards.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/mindwell/mindwell.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("mindwell.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    mode          TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL,
                    started_at    TEXT NOT NULL,
                    completed_at  TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_mode ON sessions(mode);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        // Two observers may hold connections to the same file.
        self.conn
            .busy_timeout(std::time::Duration::from_millis(500))?;
        Ok(())
    }

    /// Record a completed session to the database.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        mode: TimerMode,
        duration_secs: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO sessions (mode, duration_secs, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.as_str(),
                duration_secs,
                started_at.to_rfc3339(),
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, duration_secs, started_at, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, mode, duration_secs, started, completed) = row?;
            records.push(SessionRecord {
                id,
                mode,
                duration_secs,
                started_at: parse_timestamp(&started)?,
                completed_at: parse_timestamp(&completed)?,
            });
        }
        Ok(records)
    }

    pub fn stats_today(&self) -> Result<Stats, DatabaseError> {
        let since = today_start();
        let mut stats = self.stats_since(Some(&since))?;
        stats.today_sessions = stats.total_sessions;
        stats.today_focus_min = stats.total_focus_min;
        Ok(stats)
    }

    pub fn stats_all(&self) -> Result<Stats, DatabaseError> {
        let mut stats = self.stats_since(None)?;
        let today = self.stats_today()?;
        stats.today_sessions = today.today_sessions;
        stats.today_focus_min = today.today_focus_min;
        Ok(stats)
    }

    fn stats_since(&self, since: Option<&str>) -> Result<Stats, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT mode, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE ?1 IS NULL OR completed_at >= ?1
             GROUP BY mode",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        for row in rows {
            let (mode, count, secs) = row?;
            stats.total_sessions += count;
            match mode.parse::<TimerMode>() {
                Ok(TimerMode::Focus) => {
                    stats.focus_sessions += count;
                    stats.total_focus_min += secs / 60;
                }
                Ok(TimerMode::Break) => stats.break_sessions += count,
                Ok(TimerMode::Breathing) => stats.breathing_sessions += count,
                Err(_) => tracing::warn!("ignoring sessions with unknown mode '{}'", mode),
            }
        }
        Ok(stats)
    }

    /// Add experience points, levelling up when the next threshold is reached.
    pub fn award_xp(&self, amount: u64) -> Result<Progress, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let current = Self::progress_in(&tx)?;
        let xp = current.xp.saturating_add(amount);
        let next_threshold = LEVEL_THRESHOLDS.get(current.level as usize).copied();
        let leveled_up = next_threshold.is_some_and(|threshold| xp >= threshold);
        let level = if leveled_up {
            current.level + 1
        } else {
            current.level
        };
        Self::kv_set_in(&tx, XP_KEY, &xp.to_string())?;
        Self::kv_set_in(&tx, LEVEL_KEY, &level.to_string())?;
        tx.commit()?;
        Ok(Progress {
            xp,
            level,
            gained: amount,
            leveled_up,
        })
    }

    /// Current experience without changing it.
    pub fn progress(&self) -> Result<Progress, DatabaseError> {
        Self::progress_in(&self.conn)
    }

    fn progress_in(conn: &Connection) -> Result<Progress, DatabaseError> {
        let xp = Self::kv_get_in(conn, XP_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let level = Self::kv_get_in(conn, LEVEL_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        Ok(Progress {
            xp,
            level,
            gained: 0,
            leveled_up: false,
        })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Self::kv_get_in(&self.conn, key)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        Self::kv_set_in(&self.conn, key, value)
    }

    /// Remove a key from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn kv_get_in(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn kv_set_in(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn write(&self, session: &StoredSession) -> Result<(), StoreError> {
        let encoded = session.encode()?;
        Self::kv_set_in(&self.conn, ACTIVE_TIMER_KEY, &encoded)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        let raw = Self::kv_get_in(&self.conn, ACTIVE_TIMER_KEY)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        raw.as_deref().map(StoredSession::decode).transpose()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.kv_delete(ACTIVE_TIMER_KEY)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn claim(&self, end_at_ms: u64) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM kv WHERE key = ?1 AND json_extract(value, '$.endAt') = ?2",
            params![ACTIVE_TIMER_KEY, end_at_ms.to_string()],
        )?;
        Ok(removed == 1)
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

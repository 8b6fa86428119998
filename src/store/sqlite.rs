//! Persistent counter store using `SQLite`.
//!
//! # Schema
//!
//! A single-row `Swears` table. `CHECK(id = 1)` pins it to one row and
//! the count `CHECK` backs the conditional update with a constraint the
//! engine itself enforces.
//!
//! The update bounds the delta against the current count rather than testing
//! `count + delta`, so the sum is never formed when it would leave the range.
//! SQLite turns an overflowing integer sum into a REAL, which would slip past
//! both checks.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::{ApplyOutcome, CounterStore, StoreError, MAX_COUNT};

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS Swears (
        id INTEGER PRIMARY KEY CHECK(id = 1),
        count INTEGER NOT NULL DEFAULT 0 CHECK(count >= 0 AND count <= 9007199254740991)
    )";

const SEED_ROW: &str = "INSERT INTO Swears SELECT 1, 0 WHERE NOT EXISTS (SELECT * FROM Swears)";

const APPLY_DELTA: &str = "
    UPDATE Swears SET count = count + ?1
    WHERE id = 1 AND ?1 >= -count AND ?1 <= ?2 - count
    RETURNING count";

/// Durable counter store backed by `SQLite`
#[derive(Debug, Clone)]
pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCounterStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        info!("Opened counter database at {:?}", path);
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        debug!("Running database initializations...");
        conn.execute(CREATE_TABLE, [])?;

        if conn.execute(SEED_ROW, [])? > 0 {
            warn!("Initialized Swears table!");
        } else {
            debug!("Skipped initialization!");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read_locked(conn: &Connection) -> Result<i64, StoreError> {
        let count: Option<i64> = conn
            .query_row("SELECT count FROM Swears WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        match count {
            None => Err(StoreError::MissingRow),
            Some(count) if count < 0 => Err(StoreError::Corrupt(count)),
            Some(count) => Ok(count),
        }
    }
}

impl CounterStore for SqliteCounterStore {
    fn read(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        Self::read_locked(&conn)
    }

    fn apply_delta(&self, delta: i64) -> Result<ApplyOutcome, StoreError> {
        let conn = self.conn()?;

        let updated: Option<i64> = conn
            .query_row(APPLY_DELTA, params![delta, MAX_COUNT], |row| row.get(0))
            .optional()?;

        match updated {
            Some(count) => Ok(ApplyOutcome::Applied(count)),
            None => Ok(ApplyOutcome::refused(Self::read_locked(&conn)?, delta)),
        }
    }

    fn reset(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        if conn.execute("UPDATE Swears SET count = 0 WHERE id = 1", [])? == 0 {
            return Err(StoreError::MissingRow);
        }
        Ok(())
    }
}

use crate::clock::{Clock, SystemClock};
use crate::error::{serde_error, sqlite_error, SessionError, SessionResult};
use crate::fingerprint::session_fingerprint;
use crate::model::{Session, SessionId, DEFAULT_TTL};
use crate::store::SessionStore;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use time::Duration;
use tracing::{debug, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        expires INTEGER NOT NULL,
        data TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires);
";

/// SQLite-backed session store.
///
/// One instance owns one connection for the lifetime of the server process. Every
/// operation is a single statement, so SQLite's statement atomicity is the only
/// transaction boundary needed.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl SqliteSessionStore {
    /// Opens (or creates) the database at `path` and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(sqlite_error)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> SessionResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_error)?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection, creating the `sessions` table if needed.
    pub fn from_connection(conn: Connection) -> SessionResult<Self> {
        conn.execute_batch(SCHEMA).map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            default_ttl: DEFAULT_TTL,
        })
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Number of rows in the table, expired ones included.
    pub fn record_count(&self) -> SessionResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(sqlite_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Deletes every expired row and returns how many were removed.
    ///
    /// The store never calls this itself; reads already ignore expired rows.
    pub fn purge_expired(&self) -> SessionResult<usize> {
        let now = self.clock.now().unix_timestamp();
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM sessions WHERE expires <= ?1", params![now])
            .map_err(sqlite_error)?;
        debug!(removed, "expired sessions purged");
        Ok(removed)
    }

    /// Closes the underlying connection, reporting any error from SQLite.
    pub fn close(self) -> SessionResult<()> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, err)| sqlite_error(err))
    }

    fn encode(&self, session: &Session) -> SessionResult<(i64, String)> {
        session.validate()?;
        let expires = session.expires_at(self.clock.now(), self.default_ttl)?;
        let data = serde_json::to_string(session).map_err(serde_error)?;
        Ok((expires, data))
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, id: &SessionId) -> SessionResult<Option<Session>> {
        let now = self.clock.now().unix_timestamp();
        let row: Option<Option<String>> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT data FROM sessions WHERE id = ?1 AND expires > ?2",
                params![id.as_str(), now],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error)?
        };
        let Some(payload) = row.flatten() else {
            return Ok(None);
        };
        serde_json::from_str(&payload).map(Some).map_err(|source| {
            let fingerprint = session_fingerprint(id);
            warn!(session = %fingerprint, error = %source, "corrupt session payload");
            SessionError::Corrupt {
                fingerprint,
                source,
            }
        })
    }

    fn set(&self, id: &SessionId, session: &Session) -> SessionResult<()> {
        let (expires, data) = self.encode(session)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, expires, data) VALUES (?1, ?2, ?3)",
            params![id.as_str(), expires, data],
        )
        .map_err(sqlite_error)?;
        debug!(session = %session_fingerprint(id), expires, "session stored");
        Ok(())
    }

    fn destroy(&self, id: &SessionId) -> SessionResult<bool> {
        let conn = self.conn.lock();
        let changes = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])
            .map_err(sqlite_error)?;
        debug!(session = %session_fingerprint(id), removed = changes > 0, "session destroyed");
        Ok(changes > 0)
    }

    fn touch(&self, id: &SessionId, session: &Session) -> SessionResult<bool> {
        let now = self.clock.now().unix_timestamp();
        let (expires, data) = self.encode(session)?;
        let conn = self.conn.lock();
        let changes = conn
            .execute(
                "UPDATE sessions SET expires = ?1, data = ?2 WHERE id = ?3 AND expires > ?4",
                params![expires, data, id.as_str(), now],
            )
            .map_err(sqlite_error)?;
        if changes > 0 {
            debug!(session = %session_fingerprint(id), expires, "session touched");
        }
        Ok(changes > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(seconds: i64) -> (SqliteSessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(seconds));
        let store = SqliteSessionStore::open_in_memory()
            .expect("open")
            .with_clock(clock.clone());
        (store, clock)
    }

    fn insert_raw(store: &SqliteSessionStore, id: &str, expires: i64, data: Option<&str>) {
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO sessions (id, expires, data) VALUES (?1, ?2, ?3)",
                params![id, expires, data],
            )
            .expect("raw insert");
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("conn");
        conn.execute_batch(SCHEMA).expect("first");
        let store = SqliteSessionStore::from_connection(conn).expect("second");
        let indexes: i64 = store
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_sessions_expires'",
                [],
                |row| row.get(0),
            )
            .expect("index lookup");
        assert_eq!(indexes, 1);
    }

    #[test]
    fn null_payload_reads_as_absent() {
        let (store, _clock) = store_at(100);
        insert_raw(&store, "empty", 500, None);
        assert!(store.get(&SessionId::from("empty")).expect("get").is_none());
    }

    #[test]
    fn corrupt_payload_surfaces_as_error() {
        let (store, _clock) = store_at(100);
        insert_raw(&store, "garbled", 500, Some("[1, 2"));
        let err = store
            .get(&SessionId::from("garbled"))
            .expect_err("corrupt payload");
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }

    #[test]
    fn storage_fault_propagates() {
        let (store, _clock) = store_at(100);
        store
            .conn
            .lock()
            .execute_batch("DROP TABLE sessions")
            .expect("drop");
        let err = store
            .get(&SessionId::from("any"))
            .expect_err("missing table is a storage fault");
        assert!(err.is_storage_fault());
        assert!(store
            .set(&SessionId::from("any"), &Session::new())
            .expect_err("write fault")
            .is_storage_fault());
        assert!(store
            .destroy(&SessionId::from("any"))
            .expect_err("delete fault")
            .is_storage_fault());
        assert!(store
            .touch(&SessionId::from("any"), &Session::new())
            .expect_err("touch fault")
            .is_storage_fault());
    }

    #[test]
    fn purge_removes_only_expired_rows() {
        let (store, clock) = store_at(1_000);
        insert_raw(&store, "old", 900, Some("{}"));
        insert_raw(&store, "edge", 1_000, Some("{}"));
        insert_raw(&store, "live", 1_001, Some("{}"));

        assert_eq!(store.purge_expired().expect("purge"), 2);
        assert_eq!(store.record_count().expect("count"), 1);

        clock.advance(Duration::seconds(5));
        assert_eq!(store.purge_expired().expect("purge"), 1);
        assert_eq!(store.record_count().expect("count"), 0);
    }
}

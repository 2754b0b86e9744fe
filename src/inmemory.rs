use crate::clock::{Clock, SystemClock};
use crate::error::{serde_error, SessionError, SessionResult};
use crate::fingerprint::session_fingerprint;
use crate::model::{Session, SessionId, DEFAULT_TTL};
use crate::store::SessionStore;
use dashmap::DashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

struct Entry {
    expires: i64,
    data: String,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires > now.unix_timestamp()
    }
}

/// In-memory implementation backed by a concurrent hash map.
///
/// Payloads are kept in serialized form so reads behave exactly like the SQLite
/// backend: every `get` hands out a fresh copy and a corrupt payload is reported.
pub struct InMemorySessionStore {
    entries: DashMap<SessionId, Entry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            clock: Arc::new(SystemClock),
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl InMemorySessionStore {
    /// Constructs an empty store. Expiration is handled lazily on access.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Number of records held, expired ones included.
    pub fn record_count(&self) -> usize {
        self.entries.len()
    }

    fn encode(&self, session: &Session) -> SessionResult<Entry> {
        session.validate()?;
        let now = self.clock.now();
        Ok(Entry {
            expires: session.expires_at(now, self.default_ttl)?,
            data: serde_json::to_string(session).map_err(serde_error)?,
        })
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &SessionId) -> SessionResult<Option<Session>> {
        let now = self.clock.now();
        let Some(entry) = self.entries.get(id) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            return Ok(None);
        }
        serde_json::from_str(&entry.data).map(Some).map_err(|source| {
            let fingerprint = session_fingerprint(id);
            warn!(session = %fingerprint, error = %source, "corrupt session payload");
            SessionError::Corrupt {
                fingerprint,
                source,
            }
        })
    }

    fn set(&self, id: &SessionId, session: &Session) -> SessionResult<()> {
        let entry = self.encode(session)?;
        debug!(session = %session_fingerprint(id), expires = entry.expires, "session stored");
        self.entries.insert(id.clone(), entry);
        Ok(())
    }

    fn destroy(&self, id: &SessionId) -> SessionResult<bool> {
        let removed = self.entries.remove(id).is_some();
        debug!(session = %session_fingerprint(id), removed, "session destroyed");
        Ok(removed)
    }

    fn touch(&self, id: &SessionId, session: &Session) -> SessionResult<bool> {
        let now = self.clock.now();
        let Some(mut guard) = self.entries.get_mut(id) else {
            return Ok(false);
        };
        if !guard.is_live(now) {
            return Ok(false);
        }
        *guard = self.encode(session)?;
        debug!(session = %session_fingerprint(id), expires = guard.expires, "session touched");
        Ok(true)
    }
}

#[cfg(test)]
impl InMemorySessionStore {
    pub(crate) fn insert_raw(&self, id: &SessionId, expires: i64, data: &str) {
        self.entries.insert(
            id.clone(),
            Entry {
                expires,
                data: data.to_owned(),
            },
        );
    }
}

use crate::error::SessionResult;
use crate::model::{Session, SessionId};

/// Persistent session storage used by the site's session middleware.
///
/// Each call is an independent single-record operation. Absence is reported through
/// the return value (`None` / `false`); `Err` is reserved for storage faults and corrupt
/// payloads. Expired records are filtered on read and never swept by the store itself.
pub trait SessionStore: Send + Sync + 'static {
    /// Fetches the session for `id` if a record exists and has not expired.
    fn get(&self, id: &SessionId) -> SessionResult<Option<Session>>;

    /// Inserts or fully replaces the record for `id`.
    ///
    /// The record expires at the session cookie's expiry when it has one, otherwise
    /// after the store's default time-to-live.
    fn set(&self, id: &SessionId, session: &Session) -> SessionResult<()>;

    /// Removes the record for `id`. Returns whether a record was present.
    fn destroy(&self, id: &SessionId) -> SessionResult<bool>;

    /// Refreshes expiry and payload for a live record.
    ///
    /// Returns `false` without writing anything when `id` has no live record; an
    /// expired or destroyed session is never recreated.
    fn touch(&self, id: &SessionId, session: &Session) -> SessionResult<bool>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn get(&self, id: &SessionId) -> SessionResult<Option<Session>> {
        (**self).get(id)
    }

    fn set(&self, id: &SessionId, session: &Session) -> SessionResult<()> {
        (**self).set(id, session)
    }

    fn destroy(&self, id: &SessionId) -> SessionResult<bool> {
        (**self).destroy(id)
    }

    fn touch(&self, id: &SessionId, session: &Session) -> SessionResult<bool> {
        (**self).touch(id, session)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn get(&self, id: &SessionId) -> SessionResult<Option<Session>> {
        (**self).get(id)
    }

    fn set(&self, id: &SessionId, session: &Session) -> SessionResult<()> {
        (**self).set(id, session)
    }

    fn destroy(&self, id: &SessionId) -> SessionResult<bool> {
        (**self).destroy(id)
    }

    fn touch(&self, id: &SessionId, session: &Session) -> SessionResult<bool> {
        (**self).touch(id, session)
    }
}

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Time-to-live applied when a session carries no cookie expiry.
pub const DEFAULT_TTL: Duration = Duration::days(7);

/// Payload key holding the cookie; application fields may not use it.
pub const COOKIE_FIELD: &str = "cookie";

/// Opaque session identifier carried in the client cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Cookie attributes persisted alongside the session payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    /// Absolute expiry of the cookie; drives the stored record expiry when present.
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[cfg_attr(feature = "schema", schemars(with = "Option<String>"))]
    pub expires: Option<OffsetDateTime>,
    /// Lifetime in milliseconds the cookie was originally issued with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_max_age: Option<u64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

fn default_cookie_path() -> String {
    "/".to_owned()
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            expires: None,
            original_max_age: None,
            http_only: true,
            secure: false,
            path: default_cookie_path(),
            same_site: Some(SameSite::Lax),
        }
    }
}

impl SessionCookie {
    /// Builds a cookie expiring `max_age` after `now`.
    pub fn expiring_in(now: OffsetDateTime, max_age: Duration) -> Self {
        let millis = max_age.whole_milliseconds().clamp(0, u64::MAX as i128) as u64;
        Self {
            expires: now.checked_add(max_age),
            original_max_age: Some(millis),
            ..Self::default()
        }
    }
}

/// Server-side state for one browser session.
///
/// Application fields (for example `userId`) live in `data` and are flattened next to
/// `cookie` when serialized, so a stored payload reads `{"cookie":{..},"userId":7}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<SessionCookie>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, cookie: SessionCookie) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Sets an application field, replacing any previous value.
    ///
    /// The `cookie` key is reserved; stores refuse a session carrying it in `data`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Rejects application fields that would not survive a round trip.
    pub fn validate(&self) -> SessionResult<()> {
        if self.data.contains_key(COOKIE_FIELD) {
            return Err(SessionError::Invalid(format!(
                "`{COOKIE_FIELD}` is reserved for the session cookie"
            )));
        }
        Ok(())
    }

    /// Returns the record expiry (Unix seconds) for this session.
    ///
    /// The cookie expiry wins when present; otherwise `now + default_ttl`.
    pub fn expires_at(&self, now: OffsetDateTime, default_ttl: Duration) -> SessionResult<i64> {
        match self.cookie.as_ref().and_then(|cookie| cookie.expires) {
            Some(expires) => Ok(expires.unix_timestamp()),
            None => now
                .checked_add(default_ttl)
                .map(OffsetDateTime::unix_timestamp)
                .ok_or_else(|| {
                    SessionError::Invalid(format!("ttl of {default_ttl} overflows the clock"))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_flattens_application_fields() {
        let mut session = Session::new();
        session.insert("userId", 7);
        let encoded = serde_json::to_value(&session).expect("encode");
        assert_eq!(encoded, json!({ "userId": 7 }));
    }

    #[test]
    fn cookie_expiry_overrides_default_ttl() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("ts");
        let session = Session::new().with_cookie(SessionCookie::expiring_in(now, Duration::hours(1)));
        assert_eq!(session.expires_at(now, DEFAULT_TTL).expect("expiry"), 1_700_003_600);

        let bare = Session::new();
        assert_eq!(
            bare.expires_at(now, DEFAULT_TTL).expect("expiry"),
            1_700_000_000 + 7 * 24 * 60 * 60
        );
    }

    #[test]
    fn decodes_express_style_cookie() {
        let raw = r#"{"cookie":{"originalMaxAge":604800000,"expires":"2030-01-01T00:00:00.000Z","secure":false,"httpOnly":true,"path":"/","sameSite":"lax"},"userId":3}"#;
        let session: Session = serde_json::from_str(raw).expect("decode");
        let cookie = session.cookie.as_ref().expect("cookie");
        assert_eq!(cookie.original_max_age, Some(604_800_000));
        assert_eq!(cookie.same_site, Some(SameSite::Lax));
        assert!(cookie.http_only);
        assert_eq!(session.get("userId"), Some(&json!(3)));
    }

    #[test]
    fn overflowing_ttl_is_an_error() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("ts");
        let err = Session::new()
            .expires_at(now, Duration::seconds(i64::MAX))
            .expect_err("overflow");
        assert!(matches!(err, SessionError::Invalid(_)));
    }

    #[test]
    fn cookie_key_in_data_is_refused() {
        let mut session = Session::new();
        session.insert("flash", "saved");
        session.validate().expect("ordinary fields");

        session.insert(COOKIE_FIELD, "flash");
        assert!(matches!(session.validate(), Err(SessionError::Invalid(_))));
    }
}

use crate::error::{config_error, SessionError, SessionResult};
use crate::inmemory::InMemorySessionStore;
use crate::model::DEFAULT_TTL;
use crate::store::SessionStore;
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;
use config::{Config, Environment, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;

const DEFAULT_DATABASE_PATH: &str = "beacon.db";
const DEFAULT_UPLOADS_PATH: &str = "uploads/documents";
const DEFAULT_STATIC_ROOT: &str = ".";

/// Which session backend to build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionBackendConfig {
    InMemory,
    #[cfg(feature = "sqlite")]
    Sqlite(PathBuf),
}

/// Builds a session store for the requested backend.
pub fn create_session_store(config: SessionBackendConfig) -> SessionResult<Box<dyn SessionStore>> {
    create_session_store_with_ttl(config, DEFAULT_TTL)
}

/// Builds a session store whose sessions without a cookie expiry live for `ttl`.
pub fn create_session_store_with_ttl(
    config: SessionBackendConfig,
    ttl: Duration,
) -> SessionResult<Box<dyn SessionStore>> {
    match config {
        SessionBackendConfig::InMemory => {
            Ok(Box::new(InMemorySessionStore::new().with_default_ttl(ttl)))
        }
        #[cfg(feature = "sqlite")]
        SessionBackendConfig::Sqlite(path) => {
            let store = crate::sqlite_store::SqliteSessionStore::open(path)?;
            Ok(Box::new(store.with_default_ttl(ttl)))
        }
    }
}

/// Longest session lifetime accepted from configuration (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Process-level settings, normally read from the environment at startup.
///
/// Each field maps to the upper-cased variable of the same name (`database_path`
/// reads `DATABASE_PATH`). Unset or empty variables keep the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub uploads_path: PathBuf,
    pub static_root: PathBuf,
    pub session_ttl_secs: u64,
    pub max_upload_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            uploads_path: PathBuf::from(DEFAULT_UPLOADS_PATH),
            static_root: PathBuf::from(DEFAULT_STATIC_ROOT),
            session_ttl_secs: DEFAULT_TTL.whole_seconds().unsigned_abs(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Reads `DATABASE_PATH`, `UPLOADS_PATH`, `STATIC_ROOT`, `SESSION_TTL_SECS` and
    /// `MAX_UPLOAD_BYTES` from the process environment.
    pub fn from_env() -> SessionResult<Self> {
        Self::load(Environment::default())
    }

    /// Same as [`AppConfig::from_env`], reading from the given variables instead.
    pub fn from_vars<I, K, V>(vars: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: Map<String, String> = vars
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self::load(Environment::default().source(Some(source)))
    }

    fn load(env: Environment) -> SessionResult<Self> {
        let config = Config::builder()
            .add_source(env.ignore_empty(true).try_parsing(true))
            .build()
            .and_then(|config| config.try_deserialize::<Self>())
            .map_err(config_error)?;
        config.validate()?.absolutize()
    }

    fn validate(self) -> SessionResult<Self> {
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(SessionError::Config(format!(
                "SESSION_TTL_SECS must be between 1 and {MAX_SESSION_TTL_SECS}, got {}",
                self.session_ttl_secs
            )));
        }
        Ok(self)
    }

    fn absolutize(self) -> SessionResult<Self> {
        Ok(Self {
            database_path: absolutize(&self.database_path, "DATABASE_PATH")?,
            uploads_path: absolutize(&self.uploads_path, "UPLOADS_PATH")?,
            static_root: absolutize(&self.static_root, "STATIC_ROOT")?,
            ..self
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Backend config for the durable store at `database_path`.
    #[cfg(feature = "sqlite")]
    pub fn session_backend(&self) -> SessionBackendConfig {
        SessionBackendConfig::Sqlite(self.database_path.clone())
    }
}

fn absolutize(path: &Path, name: &str) -> SessionResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|err| SessionError::Config(format!("{name}={}: {err}", path.display())))
}

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod inmemory;
pub mod model;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;
pub mod store;
pub mod upload;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    create_session_store, create_session_store_with_ttl, AppConfig, SessionBackendConfig,
};
pub use error::{GuardError, GuardResult, SessionError, SessionResult};
pub use guard::{resolve_and_check, StaticGuard, StaticOutcome};
pub use model::{Session, SessionCookie, SessionId, DEFAULT_TTL};
pub use store::SessionStore;
pub use upload::{disposition_filename, generate_stored_name, StoredUpload, UploadRoot};

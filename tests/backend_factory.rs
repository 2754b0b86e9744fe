use arguspage_session::{
    create_session_store, create_session_store_with_ttl, AppConfig, Session, SessionBackendConfig,
    SessionError, SessionId,
};
use time::Duration;
use serde_json::json;

fn user_session(user: i64) -> Session {
    let mut session = Session::new();
    session.insert("userId", user);
    session
}

#[test]
fn factory_returns_inmemory_store() {
    let store = create_session_store(SessionBackendConfig::InMemory)
        .expect("factory should build in-memory store");
    let id = SessionId::generate();
    store.set(&id, &user_session(7)).expect("set succeeds");
    let fetched = store
        .get(&id)
        .expect("get succeeds")
        .expect("session exists");
    assert_eq!(fetched.get("userId"), Some(&json!(7)));
}

#[cfg(feature = "sqlite")]
#[test]
fn factory_builds_sqlite_store_from_app_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("beacon.db");
    let db_path_str = db_path.to_string_lossy().into_owned();
    let config = AppConfig::from_vars([("DATABASE_PATH", db_path_str)]).expect("config");

    let store = create_session_store(config.session_backend()).expect("sqlite store");
    let id = SessionId::from("factory-sqlite");
    store.set(&id, &user_session(3)).expect("set");
    assert!(store.get(&id).expect("get").is_some());
    assert!(store.destroy(&id).expect("destroy"));
    assert!(db_path.exists());
}

#[cfg(feature = "sqlite")]
#[test]
fn factory_reports_unopenable_database_as_storage_fault() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing_parent = dir.path().join("no/such/dir/beacon.db");
    let err = match create_session_store(SessionBackendConfig::Sqlite(missing_parent)) {
        Ok(_) => panic!("opening under a missing directory should fail"),
        Err(err) => err,
    };
    assert!(err.is_storage_fault(), "unexpected error: {err}");
}

fn overflowing_ttl_is_refused(backend: SessionBackendConfig) {
    let store = create_session_store_with_ttl(backend, Duration::seconds(i64::MAX)).expect("store");
    let id = SessionId::from("forever");
    let err = store.set(&id, &user_session(1)).expect_err("expiry overflow");
    assert!(matches!(err, SessionError::Invalid(_)), "{err}");
    assert!(store.get(&id).expect("get").is_none());
}

#[test]
fn inmemory_store_refuses_overflowing_ttl() {
    overflowing_ttl_is_refused(SessionBackendConfig::InMemory);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_store_refuses_overflowing_ttl() {
    let dir = tempfile::tempdir().expect("tempdir");
    overflowing_ttl_is_refused(SessionBackendConfig::Sqlite(dir.path().join("ttl.db")));
}

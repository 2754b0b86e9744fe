use arguspage_session::{
    create_session_store_with_ttl, disposition_filename, AppConfig, GuardError, Session,
    SessionCookie, SessionId, SessionResult, StaticGuard, StaticOutcome, UploadRoot,
};
use time::{Duration, OffsetDateTime};

fn run_session_demo(config: &AppConfig) -> SessionResult<()> {
    println!("== Session store demo ==");
    let store = create_session_store_with_ttl(config.session_backend(), config.session_ttl())?;

    let id = SessionId::generate();
    let mut session = Session::new().with_cookie(SessionCookie::expiring_in(
        OffsetDateTime::now_utc(),
        Duration::hours(1),
    ));
    session.insert("userId", 7);
    store.set(&id, &session)?;
    println!("Logged in, session stored in {}", config.database_path.display());

    if let Some(loaded) = store.get(&id)? {
        println!("Loaded userId {}", loaded.get("userId").cloned().unwrap_or_default());
    }

    store.touch(&id, &session)?;
    store.destroy(&id)?;
    println!("Logged out, session present: {}", store.get(&id)?.is_some());
    Ok(())
}

fn run_upload_demo(config: &AppConfig) -> Result<(), GuardError> {
    println!("== Upload guard demo ==");
    let uploads = UploadRoot::create(&config.uploads_path)?.with_max_bytes(config.max_upload_bytes);
    let stored = uploads.store("Pricing \"v2\".txt", b"Pro plan: $29/mo")?;
    println!(
        "Stored {} as {} (download name {})",
        stored.original_name,
        stored.stored_name,
        disposition_filename(&stored.original_name)
    );

    match uploads.open("../../etc/passwd") {
        Err(GuardError::InvalidPath(reason)) => println!("Blocked traversal: {reason}"),
        other => println!("Unexpected: {other:?}"),
    }

    uploads.remove(&stored.stored_name)?;

    let site = StaticGuard::new(&config.static_root)?;
    for request in ["/features", "/css/site.css", "/beacon.db", "/..%2f..%2fetc%2fpasswd"] {
        let outcome = match site.resolve(request) {
            StaticOutcome::Serve(path) => format!("serve {}", path.display()),
            StaticOutcome::PassThrough => "pass through".to_owned(),
            StaticOutcome::Forbidden => "forbidden".to_owned(),
        };
        println!("{request} -> {outcome}");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("arguspage-quickstart");
    let db = dir.join("beacon.db").to_string_lossy().into_owned();
    let uploads = dir.join("uploads").to_string_lossy().into_owned();
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    vars.push(("DATABASE_PATH".to_owned(), db));
    vars.push(("UPLOADS_PATH".to_owned(), uploads));
    let config = AppConfig::from_vars(vars)?;
    std::fs::create_dir_all(&dir)?;

    run_session_demo(&config)?;
    run_upload_demo(&config)?;
    Ok(())
}

use arguspage_session::guard::{is_contained, normalize_lexically};
use arguspage_session::{resolve_and_check, StaticGuard, StaticOutcome};
use proptest::prelude::*;
use std::path::Path;

const ROOT: &str = "/data/uploads";

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_owned()),
        Just(".".to_owned()),
        Just("%2e%2e".to_owned()),
        Just("".to_owned()),
        "[a-z0-9_-]{1,8}",
        "[a-z]{1,6}\\.(pdf|txt|css)",
    ]
}

fn candidate() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 0..8).prop_map(|parts| parts.join("/"))
}

proptest! {
    #[test]
    fn approved_paths_never_leave_root(candidate in candidate()) {
        if let Ok(path) = resolve_and_check(Path::new(ROOT), &candidate) {
            prop_assert!(is_contained(Path::new(ROOT), &path), "{candidate} -> {}", path.display());
            prop_assert_eq!(normalize_lexically(&path), path.clone());
        }
    }

    #[test]
    fn rejection_matches_lexical_escape(candidate in candidate()) {
        let decoded = candidate.replace("%2e", ".");
        let joined = normalize_lexically(&Path::new(ROOT).join(&decoded));
        let escapes = !is_contained(Path::new(ROOT), &joined);
        let result = resolve_and_check(Path::new(ROOT), &candidate);
        prop_assert_eq!(result.is_err(), escapes, "{}", candidate);
    }

    #[test]
    fn plain_names_are_always_approved(name in "[A-Za-z0-9][A-Za-z0-9._-]{0,40}") {
        let path = resolve_and_check(Path::new(ROOT), &name).expect("plain name");
        prop_assert_eq!(path, Path::new(ROOT).join(&name));
    }

    #[test]
    fn static_guard_never_serves_outside_root(candidate in candidate()) {
        let guard = StaticGuard::new("/srv/site").expect("absolute root");
        if let StaticOutcome::Serve(path) = guard.resolve(&format!("/{candidate}")) {
            prop_assert!(path.starts_with("/srv/site"));
        }
    }
}

use crate::error::{invalid_path, GuardError, GuardResult};
use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Collapses `.` and `..` components without touching the filesystem.
///
/// A `..` at the filesystem root stays at the root, matching how the OS resolves it.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Returns true when `candidate` is `root` or lies beneath it.
///
/// Comparison is per path component, so `/srv/uploads-old` is not inside `/srv/uploads`.
pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// Joins `candidate` onto `root` and approves the result only if it stays inside `root`.
///
/// The candidate is percent-decoded once, then normalized, then checked; encoded
/// traversal such as `%2e%2e%2f` is therefore caught after decoding. When the root
/// exists on disk the nearest existing ancestor of the target is canonicalized as well,
/// so a symlink inside the root cannot point outside it.
pub fn resolve_and_check(root: &Path, candidate: &str) -> GuardResult<PathBuf> {
    let decoded = percent_decode_str(candidate).decode_utf8().map_err(|_| {
        warn!(candidate, "rejected path: not UTF-8 after decoding");
        invalid_path(format!("not valid UTF-8 after decoding: {candidate}"))
    })?;
    check_decoded(root, &decoded)
}

pub(crate) fn check_decoded(root: &Path, candidate: &str) -> GuardResult<PathBuf> {
    if !root.is_absolute() {
        return Err(invalid_path(format!(
            "root must be absolute: {}",
            root.display()
        )));
    }
    if candidate.contains('\0') {
        warn!(candidate, "rejected path: embedded NUL");
        return Err(invalid_path("embedded NUL in path"));
    }

    let root = normalize_lexically(root);
    let target = normalize_lexically(&root.join(candidate));
    if !is_contained(&root, &target) {
        warn!(candidate, root = %root.display(), "rejected path: escapes root");
        return Err(invalid_path(format!("{candidate} escapes {}", root.display())));
    }

    verify_on_disk(&root, &target, candidate)?;
    Ok(target)
}

fn verify_on_disk(root: &Path, target: &Path, candidate: &str) -> GuardResult<()> {
    let root_canonical = match root.canonicalize() {
        Ok(path) => path,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(GuardError::Io(err)),
    };

    let mut current = Some(target);
    while let Some(path) = current {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => {
                let canonical = path.canonicalize().map_err(|err| {
                    if meta.file_type().is_symlink() {
                        invalid_path(format!("symlink target missing or invalid: {candidate}"))
                    } else {
                        GuardError::Io(err)
                    }
                })?;
                if !is_contained(&root_canonical, &canonical) {
                    warn!(candidate, "rejected path: resolves outside root");
                    return Err(invalid_path(format!(
                        "{candidate} resolves outside {}",
                        root.display()
                    )));
                }
                return Ok(());
            }
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                current = path.parent()
            }
            Err(err) => return Err(GuardError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
    }

    #[test]
    fn containment_respects_segment_boundaries() {
        let root = Path::new("/data/uploads");
        assert!(is_contained(root, Path::new("/data/uploads")));
        assert!(is_contained(root, Path::new("/data/uploads/a/b.pdf")));
        assert!(!is_contained(root, Path::new("/data/uploads-evil/a.pdf")));
        assert!(!is_contained(root, Path::new("/data")));
    }

    #[test]
    fn relative_root_is_refused() {
        let err = resolve_and_check(Path::new("uploads"), "a.pdf").expect_err("relative root");
        assert!(err.is_invalid_path());
    }

    #[test]
    fn absolute_candidate_replaces_root_and_is_rejected() {
        let err =
            resolve_and_check(Path::new("/data/uploads"), "/etc/passwd").expect_err("absolute");
        assert!(err.is_invalid_path());
    }

    #[test]
    fn nul_byte_is_rejected_even_when_encoded() {
        let err = resolve_and_check(Path::new("/data/uploads"), "a%00.pdf").expect_err("nul");
        assert!(err.is_invalid_path());
    }

    #[test]
    fn invalid_utf8_after_decoding_is_rejected() {
        let err = resolve_and_check(Path::new("/data/uploads"), "%ff%fe").expect_err("utf8");
        assert!(err.is_invalid_path());
    }
}

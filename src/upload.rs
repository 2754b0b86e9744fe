//! Storage of uploaded documents under a single root directory.

use crate::error::{invalid_path, GuardError, GuardResult};
use crate::guard::{normalize_lexically, resolve_and_check};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default ceiling for a single uploaded document (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

const MAX_STEM_CHARS: usize = 80;
const MAX_EXTENSION_CHARS: usize = 10;
const MAX_DISPOSITION_CHARS: usize = 200;

/// A file written under an [`UploadRoot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUpload {
    /// Server-generated name, relative to the root. This is what gets persisted.
    pub stored_name: String,
    /// Name the client supplied; only used for display and downloads.
    pub original_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Directory holding uploaded documents.
///
/// Every read and delete re-runs the containment check on the stored name, so a
/// tampered database row cannot reach outside the root.
#[derive(Clone, Debug)]
pub struct UploadRoot {
    root: PathBuf,
    max_bytes: u64,
}

impl UploadRoot {
    /// Creates the directory if needed and anchors the root at its absolute path.
    pub fn create(root: impl AsRef<Path>) -> GuardResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = normalize_lexically(&std::path::absolute(root)?);
        Ok(Self {
            root,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored name to an approved path inside the root.
    pub fn resolve(&self, stored_name: &str) -> GuardResult<PathBuf> {
        resolve_and_check(&self.root, stored_name)
    }

    /// Writes `contents` under a freshly generated name.
    ///
    /// The file is created exclusively, so an existing file is never overwritten.
    pub fn store(&self, original_name: &str, contents: &[u8]) -> GuardResult<StoredUpload> {
        let size = contents.len() as u64;
        if size > self.max_bytes {
            return Err(GuardError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let stored_name = generate_stored_name(original_name, OffsetDateTime::now_utc());
        let path = self.resolve(&stored_name)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let written = file.write_all(contents).and_then(|()| file.sync_all());
        drop(file);
        if let Err(err) = written {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!(stored_name = %stored_name, error = %cleanup, "partial upload left on disk");
            }
            return Err(GuardError::Io(err));
        }

        info!(stored_name = %stored_name, size, "upload stored");
        Ok(StoredUpload {
            stored_name,
            original_name: original_name.to_owned(),
            path,
            size,
        })
    }

    /// Opens a stored file for download.
    ///
    /// Fails with [`GuardError::InvalidPath`] before touching the filesystem when the
    /// name escapes the root, and with [`GuardError::NotFound`] when it is simply missing.
    pub fn open(&self, stored_name: &str) -> GuardResult<(PathBuf, File)> {
        let path = self.resolve(stored_name)?;
        if path == self.root {
            return Err(invalid_path("stored name resolves to the upload root"));
        }
        match File::open(&path) {
            Ok(file) => Ok((path, file)),
            Err(err) if is_missing(&err) => Err(GuardError::NotFound(path)),
            Err(err) => Err(GuardError::Io(err)),
        }
    }

    /// Deletes a stored file. Returns `false` when it was already gone.
    pub fn remove(&self, stored_name: &str) -> GuardResult<bool> {
        let path = self.resolve(stored_name)?;
        if path == self.root {
            return Err(invalid_path("stored name resolves to the upload root"));
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(stored_name, "upload removed");
                Ok(true)
            }
            Err(err) if is_missing(&err) => Ok(false),
            Err(err) => Err(GuardError::Io(err)),
        }
    }
}

/// A path through a regular file (`report.pdf/x`) is as missing as an absent one.
fn is_missing(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Builds a collision-resistant file name from the client's file name.
///
/// Format: `{unix millis}-{8 random hex}-{sanitized stem}{.ext}`. Only
/// `[A-Za-z0-9.-]` survive sanitization, so the result never contains a separator.
pub fn generate_stored_name(original_name: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let nonce = Uuid::new_v4().simple().to_string();
    let nonce = &nonce[..8];

    let original = Path::new(original_name);
    let stem = original
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let mut stem: String = sanitize(stem).chars().take(MAX_STEM_CHARS).collect();
    if stem.trim_matches('.').is_empty() {
        stem = "file".to_owned();
    }

    let extension = original
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_CHARS
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("{millis}-{nonce}-{stem}{extension}")
}

fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Makes a name safe for a quoted `Content-Disposition` filename.
pub fn disposition_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' { '\'' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return "download".to_owned();
    }
    trimmed.chars().take(MAX_DISPOSITION_CHARS).collect()
}

use super::paths::{check_decoded, normalize_lexically};
use crate::error::{GuardError, GuardResult};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File extensions the static catch-all will serve.
pub const DEFAULT_STATIC_EXTENSIONS: &[&str] =
    &["html", "css", "js", "ico", "svg", "png", "jpg", "json"];

/// Decision for one static file request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaticOutcome {
    /// Serve the file at this path (it may still be missing on disk).
    Serve(PathBuf),
    /// Not a static asset; let the next handler answer (normally a 404).
    PassThrough,
    /// The request tried to leave the served root.
    Forbidden,
}

/// Guard for the site's static file catch-all route.
#[derive(Clone, Debug)]
pub struct StaticGuard {
    root: PathBuf,
    extensions: Vec<String>,
}

impl StaticGuard {
    /// Serves from `root` with [`DEFAULT_STATIC_EXTENSIONS`].
    ///
    /// A relative root is anchored at the current directory.
    pub fn new(root: impl AsRef<Path>) -> GuardResult<Self> {
        let root = normalize_lexically(&std::path::absolute(root.as_ref())?);
        Ok(Self {
            root,
            extensions: DEFAULT_STATIC_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_owned())
                .collect(),
        })
    }

    /// Replaces the allow-list. Extensions are given without the leading dot.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn allows(&self, extension: &str) -> bool {
        self.extensions.iter().any(|allowed| allowed == extension)
    }

    /// Maps a URL path such as `/css/site.css` or `/features` to a file under the root.
    ///
    /// Paths without an extension are looked up as `<path>.html`.
    pub fn resolve(&self, request_path: &str) -> StaticOutcome {
        let Ok(decoded) = percent_decode_str(request_path).decode_utf8() else {
            warn!(request_path, "static request is not UTF-8 after decoding");
            return StaticOutcome::Forbidden;
        };
        let relative = decoded.trim_start_matches('/');
        if relative.is_empty() {
            return StaticOutcome::PassThrough;
        }

        let candidate = match Path::new(relative).extension().and_then(|ext| ext.to_str()) {
            None => format!("{relative}.html"),
            Some(ext) if self.allows(ext) => relative.to_owned(),
            Some(_) => return StaticOutcome::PassThrough,
        };

        match check_decoded(&self.root, &candidate) {
            Ok(path) => StaticOutcome::Serve(path),
            Err(GuardError::InvalidPath(_)) => StaticOutcome::Forbidden,
            Err(err) => {
                warn!(request_path, error = %err, "static lookup failed");
                StaticOutcome::PassThrough
            }
        }
    }
}

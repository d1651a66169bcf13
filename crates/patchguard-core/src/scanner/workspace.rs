use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, warn};

use super::{Language, ScanError};

const SNIPPET_STEM: &str = "snippet";

/// File name used for a snippet of the given language (`snippet.py` for
/// Python, extensionless otherwise).
pub fn snippet_file_name(language: &str) -> String {
    match language.parse::<Language>() {
        Ok(Language::Python) => format!("{SNIPPET_STEM}.py"),
        _ => SNIPPET_STEM.to_string(),
    }
}

/// Ephemeral directory holding one snippet file.
///
/// The directory is removed recursively when the value is dropped, so every
/// exit path (including `?` on an analyzer failure) releases it.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
    file: PathBuf,
    file_name: String,
}

impl TempWorkspace {
    /// Create a fresh directory and write `code` into it byte-for-byte.
    pub fn create(code: &str, language: &str) -> Result<Self, ScanError> {
        let dir = tempfile::Builder::new()
            .prefix("patchguard-")
            .tempdir()
            .map_err(ScanError::Workspace)?;
        let file_name = snippet_file_name(language);
        let file = dir.path().join(&file_name);
        fs::write(&file, code.as_bytes()).map_err(ScanError::Workspace)?;
        debug!(path = %file.display(), bytes = code.len(), "materialized snippet");
        Ok(Self {
            dir,
            file,
            file_name,
        })
    }

    /// Absolute path of the snippet file.
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Absolute path of the enclosing directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Stable name analyzers' output is rewritten to.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Remove the directory now, surfacing removal errors instead of
    /// ignoring them as `Drop` does.
    pub fn close(self) -> Result<(), ScanError> {
        let location = self.dir.path().to_path_buf();
        self.dir.close().map_err(|err| {
            warn!(path = %location.display(), error = %err, "failed to remove scan workspace");
            ScanError::Workspace(err)
        })
    }
}

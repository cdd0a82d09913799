//! # Upload Staging
//!
//! Uploads only ever touch disk inside a [`Workspace`]: a uniquely named
//! directory created under the configured temp directory for one request.
//!
//! ## Rust Concepts:
//! - **RAII**: `tempfile::TempDir` removes the directory when it is dropped, so
//!   every exit path (early `?` return, error, panic unwinding) cleans up
//! - **Ownership**: the request's pipeline run owns the workspace; nothing else
//!   can hold on to the files after the run returns

use crate::error::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extension used when the client's filename has none worth keeping.
const DEFAULT_EXTENSION: &str = "wav";
const MAX_EXTENSION_LEN: usize = 10;

/// An accepted upload, held in memory until the pipeline stages it.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl UploadedAudio {
    pub fn new(bytes: Vec<u8>, filename: Option<String>) -> Self {
        Self { bytes, filename }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The declared extension, lowercased and restricted to ASCII
    /// alphanumerics, so the transcoder can probe the container.
    ///
    /// ## Examples:
    /// - `recording.WEBM` -> `webm`
    /// - `../../etc/passwd` -> `wav`
    /// - no filename -> `wav`
    pub fn extension(&self) -> String {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

/// Scratch directory owned by one analysis request.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `parent`.
    pub fn create(parent: &Path) -> Result<Self, PipelineError> {
        let dir = tempfile::Builder::new()
            .prefix("voice-analysis-")
            .tempdir_in(parent)
            .map_err(|e| PipelineError::Storage(format!("cannot create scratch directory: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the upload into the workspace and return where it landed.
    pub fn persist(&self, upload: &UploadedAudio) -> Result<PathBuf, PipelineError> {
        let path = self.dir.path().join(format!("upload.{}", upload.extension()));
        fs::write(&path, upload.bytes())?;
        Ok(path)
    }

    /// Destination for the transcoder's canonical WAV output.
    pub fn normalized_path(&self) -> PathBuf {
        self.dir.path().join("normalized.wav")
    }

    /// Remove the directory now, reporting failures instead of ignoring them
    /// the way `Drop` has to.
    pub fn close(self) -> Result<(), PipelineError> {
        self.dir.close().map_err(PipelineError::from)
    }
}

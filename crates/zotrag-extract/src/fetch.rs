//! Attachment download into self-deleting temp files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{Builder, TempPath};
use tracing::debug;
use zotrag_core::{LibrarySource, TaskError};

use crate::validate::validate_pdf;

/// A validated PDF in a temp file.
///
/// The file is deleted when this value is dropped, on every path: success,
/// a failed conversion, a panic, or an aborted task.
#[derive(Debug)]
pub struct FetchedPdf {
    path: TempPath,
    size: u64,
}

impl FetchedPdf {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validated size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Downloads attachments from a [`LibrarySource`] and validates them.
#[derive(Clone)]
pub struct AttachmentFetcher {
    source: Arc<dyn LibrarySource>,
    temp_dir: Option<PathBuf>,
}

impl AttachmentFetcher {
    pub fn new(source: Arc<dyn LibrarySource>) -> Self {
        Self {
            source,
            temp_dir: None,
        }
    }

    /// Stage downloads in `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Download `attachment_key` to a fresh temp file and validate it.
    ///
    /// No retries. Remote errors become [`TaskError::Fetch`], structural
    /// problems [`TaskError::Validation`]; in both cases nothing is left on
    /// disk.
    pub async fn fetch_and_validate(&self, attachment_key: &str) -> Result<FetchedPdf, TaskError> {
        let bytes = self
            .source
            .fetch_attachment(attachment_key)
            .await
            .map_err(|e| TaskError::Fetch(e.to_string()))?;
        debug!("Downloaded {} ({} bytes)", attachment_key, bytes.len());

        let temp_dir = self.temp_dir.clone();
        tokio::task::spawn_blocking(move || stage(&bytes, temp_dir.as_deref()))
            .await
            .map_err(|e| TaskError::Unexpected(format!("staging task failed: {e}")))?
    }
}

fn stage(bytes: &[u8], temp_dir: Option<&Path>) -> Result<FetchedPdf, TaskError> {
    let staging = |e: std::io::Error| TaskError::Fetch(format!("cannot stage attachment: {e}"));

    let mut builder = Builder::new();
    builder.prefix("zotrag-").suffix(".pdf");
    let mut file = match temp_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(staging)?;
            builder.tempfile_in(dir)
        }
        None => builder.tempfile(),
    }
    .map_err(staging)?;

    file.write_all(bytes).map_err(staging)?;
    file.flush().map_err(staging)?;

    let path = file.into_temp_path();
    let size = validate_pdf(&path)?;
    Ok(FetchedPdf { path, size })
}

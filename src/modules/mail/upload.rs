// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;

use futures::future::join_all;
use tracing::{debug, warn};

/// A file received from the client and spooled to the uploads directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// Name supplied by the client, used as the attachment name.
    pub original_name: String,
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub removed: usize,
    pub failed: usize,
}

/// Owns the spooled files of one request.
///
/// [`UploadBatch::release_all`] removes every file exactly once. A batch that is
/// dropped without being released (cancelled request, panic) cleans up
/// synchronously instead.
#[derive(Debug, Default)]
pub struct UploadBatch {
    files: Vec<UploadedFile>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file. Call this before any bytes are written to `file.path`.
    pub fn push(&mut self, file: UploadedFile) -> &mut UploadedFile {
        self.files.push(file);
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub async fn release_all(mut self) -> ReleaseSummary {
        let files = std::mem::take(&mut self.files);
        let results = join_all(files.iter().map(|f| tokio::fs::remove_file(&f.path))).await;

        let mut summary = ReleaseSummary::default();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(()) => {
                    debug!("File removed: {:?}", file.path);
                    summary.removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove uploaded file {:?}: {}", file.path, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl Drop for UploadBatch {
    fn drop(&mut self) {
        if self.files.is_empty() {
            return;
        }
        warn!(
            count = self.files.len(),
            "Upload batch dropped before release, removing spooled files"
        );
        for file in self.files.drain(..) {
            if let Err(e) = std::fs::remove_file(&file.path) {
                warn!("Failed to remove uploaded file {:?}: {}", file.path, e);
            }
        }
    }
}

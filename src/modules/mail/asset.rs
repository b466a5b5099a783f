// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{io::ErrorKind, path::PathBuf};

use crate::{
    modules::error::{code::ErrorCode, GatewayResult},
    raise_error,
};

/// Read-only directory of text fragments (signature, canned bodies).
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Assets are re-read on every call so edits apply without a restart.
    pub async fn read_asset(&self, name: &str) -> GatewayResult<String> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." || name == "." {
            return Err(raise_error!(
                format!("Invalid asset name '{}'", name),
                ErrorCode::InvalidParameter
            ));
        }
        let path = self.root.join(name);
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => raise_error!(
                format!("Asset '{}' not found in {:?}", name, self.root),
                ErrorCode::ResourceNotFound
            ),
            _ => raise_error!(
                format!("Failed to read asset {:?}: {}", path, e),
                ErrorCode::FileIoError
            ),
        })
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::{
    base64_encode,
    modules::{
        error::{code::ErrorCode, GatewayResult},
        mail::upload::UploadedFile,
    },
    raise_error,
};

pub const FILE_ATTACHMENT_TYPE: &str = "#microsoft.graph.fileAttachment";

/// Graph `fileAttachment` carried inline in the message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 (standard alphabet, padded) of the raw file bytes.
    pub content_bytes: String,
}

impl Attachment {
    pub async fn read(file: &UploadedFile) -> GatewayResult<Self> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
            raise_error!(
                format!(
                    "Failed to read uploaded file '{}' at {:?}: {}",
                    file.original_name, file.path, e
                ),
                ErrorCode::FileIoError
            )
        })?;
        Ok(Self {
            odata_type: FILE_ATTACHMENT_TYPE.to_string(),
            name: display_name(file),
            content_type: content_type(file),
            content_bytes: base64_encode!(&bytes),
        })
    }
}

/// Reads every file concurrently. The result keeps the input order; the first
/// failure aborts the whole batch.
pub async fn read_attachments(files: &[UploadedFile]) -> GatewayResult<Vec<Attachment>> {
    try_join_all(files.iter().map(Attachment::read)).await
}

fn display_name(file: &UploadedFile) -> String {
    // Some clients send a full local path as the file name.
    let name = file
        .original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if !name.is_empty() {
        return name.to_string();
    }
    file.path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

fn content_type(file: &UploadedFile) -> Option<String> {
    file.content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_path(&file.original_name)
                .first()
                .map(|m| m.essence_str().to_string())
        })
}

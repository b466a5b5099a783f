// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::Path;

use poem::web::{Field, Multipart};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::{
    generate_token,
    modules::{
        common::limit::UploadLimit,
        error::{code::ErrorCode, GatewayError, GatewayResult},
        mail::upload::{UploadBatch, UploadedFile},
    },
    raise_error,
};

/// JSON payload of every form.
pub const DATA_FIELD: &str = "data";
const FILE_FIELDS: [&str; 2] = ["file[]", "file"];

/// Bytes a form may still deliver. Every part is read through a reader capped
/// one byte past what is left, so chunked bodies are bounded as well.
struct BodyBudget {
    limit: u64,
    remaining: u64,
}

impl BodyBudget {
    fn new(limit: UploadLimit) -> Self {
        let limit = limit.max_bytes() as u64;
        Self {
            limit,
            remaining: limit,
        }
    }

    fn read_cap(&self) -> u64 {
        self.remaining.saturating_add(1)
    }

    fn consume(&mut self, size: u64) -> GatewayResult<()> {
        if size > self.remaining {
            return Err(raise_error!(
                format!("Request body exceeds the {} byte limit", self.limit),
                ErrorCode::PayloadTooLarge
            ));
        }
        self.remaining -= size;
        Ok(())
    }
}

/// Parses the `data` field into `T` and spools every file field into
/// `uploads_dir`. Each file joins `batch` before its bytes are written, so the
/// caller can always release what was received, even when parsing fails halfway.
pub async fn receive_form<T: DeserializeOwned>(
    mut multipart: Multipart,
    uploads_dir: &Path,
    limit: UploadLimit,
    batch: &mut UploadBatch,
) -> GatewayResult<T> {
    let mut budget = BodyBudget::new(limit);
    let mut data = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(DATA_FIELD) => data = Some(read_text(field, &mut budget).await?),
            Some(name) if FILE_FIELDS.contains(&name) => {
                spool_file(field, uploads_dir, &mut budget, batch).await?
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }
    parse_data(data)
}

/// Like [`receive_form`] for forms that carry no files.
pub async fn receive_data<T: DeserializeOwned>(
    mut multipart: Multipart,
    limit: UploadLimit,
) -> GatewayResult<T> {
    let mut budget = BodyBudget::new(limit);
    let mut data = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        if field.name() == Some(DATA_FIELD) {
            data = Some(read_text(field, &mut budget).await?);
        }
    }
    parse_data(data)
}

async fn read_text(field: Field, budget: &mut BodyBudget) -> GatewayResult<String> {
    let mut buf = Vec::new();
    Box::pin(field.into_async_read())
        .take(budget.read_cap())
        .read_to_end(&mut buf)
        .await
        .map_err(invalid_form)?;
    budget.consume(buf.len() as u64)?;
    String::from_utf8(buf).map_err(invalid_form)
}

async fn spool_file(
    field: Field,
    uploads_dir: &Path,
    budget: &mut BodyBudget,
    batch: &mut UploadBatch,
) -> GatewayResult<()> {
    let original_name = match field.file_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        // Browsers submit an empty part when no file was picked.
        _ => return Ok(()),
    };
    let content_type = field.content_type().map(str::to_string);
    let path = uploads_dir.join(generate_token!(128));

    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        raise_error!(
            format!("Failed to create upload file {:?}: {}", path, e),
            ErrorCode::FileIoError
        )
    })?;
    let entry = batch.push(UploadedFile {
        path,
        original_name,
        size: 0,
        content_type,
    });

    let mut reader = Box::pin(field.into_async_read()).take(budget.read_cap());
    let size = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| {
            raise_error!(
                format!("Failed to receive upload '{}': {}", entry.original_name, e),
                ErrorCode::FileIoError
            )
        })?;
    budget.consume(size)?;
    file.flush().await.map_err(|e| {
        raise_error!(
            format!("Failed to write upload {:?}: {}", entry.path, e),
            ErrorCode::FileIoError
        )
    })?;
    entry.size = size;
    debug!(name = %entry.original_name, size, "Upload spooled to {:?}", entry.path);
    Ok(())
}

fn parse_data<T: DeserializeOwned>(data: Option<String>) -> GatewayResult<T> {
    let data = data.ok_or_else(|| {
        raise_error!(
            format!("Missing multipart field '{}'", DATA_FIELD),
            ErrorCode::InvalidParameter
        )
    })?;
    serde_json::from_str(&data).map_err(|e| {
        raise_error!(
            format!("Field '{}' is not valid JSON: {}", DATA_FIELD, e),
            ErrorCode::InvalidParameter
        )
    })
}

fn invalid_form(e: impl std::fmt::Display) -> GatewayError {
    raise_error!(
        format!("Malformed multipart body: {}", e),
        ErrorCode::InvalidParameter
    )
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::{http::header::CONTENT_LENGTH, Endpoint, Middleware, Request, Result};

use crate::modules::error::code::ErrorCode;

use super::create_api_error_response;

/// Caps the body of upload routes.
///
/// A declared `Content-Length` above the cap is rejected up front. Bodies
/// without one (chunked or streamed) pass through; the cap travels with the
/// request so the multipart reader can enforce it while spooling.
#[derive(Clone, Copy, Debug)]
pub struct UploadLimit {
    max_bytes: usize,
}

impl UploadLimit {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl<E: Endpoint> Middleware<E> for UploadLimit {
    type Output = UploadLimitEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        UploadLimitEndpoint { ep, limit: *self }
    }
}

pub struct UploadLimitEndpoint<E> {
    ep: E,
    limit: UploadLimit,
}

impl<E: Endpoint> Endpoint for UploadLimitEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, mut req: Request) -> Result<Self::Output> {
        let declared = req
            .header(CONTENT_LENGTH)
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(declared) = declared.filter(|len| *len > self.limit.max_bytes) {
            return Err(create_api_error_response(
                &format!(
                    "Request body of {} bytes exceeds the {} byte limit",
                    declared, self.limit.max_bytes
                ),
                ErrorCode::PayloadTooLarge,
            ));
        }
        req.extensions_mut().insert(self.limit);
        self.ep.call(req).await
    }
}

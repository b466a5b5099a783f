// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::error::code::ErrorCode;
use super::error::GatewayError;
use poem::error::ResponseError;
use poem::{http::StatusCode, Error, Response};
use tracing::error;

pub mod auth;
pub mod error;
pub mod limit;
pub mod log;
pub mod timeout;
pub mod validator;

/// JSON error body shared by every failing route: `{"code": .., "message": ..}`,
/// plus `requestId` when the request went through the tracing middleware.
pub fn error_body(code: ErrorCode, message: &str, request_id: Option<&str>) -> String {
    let mut body = serde_json::json!({
        "code": code as u32,
        "message": message,
    });
    if let Some(id) = request_id {
        body["requestId"] = id.into();
    }
    body.to_string()
}

#[inline]
pub fn create_api_error_response(message: &str, code: ErrorCode) -> Error {
    GatewayError::Generic {
        message: message.into(),
        location: snafu::Location::default(),
        code,
    }
    .into()
}

impl ResponseError for GatewayError {
    fn status(&self) -> StatusCode {
        self.code().status()
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        match self {
            GatewayError::Generic {
                message,
                location,
                code,
            } => {
                error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location
                );

                Response::builder()
                    .status(self.status())
                    .content_type("application/json")
                    .body(error_body(*code, message, None))
            }
        }
    }
}

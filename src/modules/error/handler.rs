// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::common::error_body;
use crate::modules::error::{code::ErrorCode, GatewayError};
use poem::error::SizedLimitError;
use poem::{IntoResponse, Response};
use tracing::error;

pub async fn error_handler(error: poem::Error) -> impl poem::IntoResponse {
    render_error(error, None)
}

/// Renders any error as the JSON error body, tagged with `request_id` when known.
pub fn render_error(error: poem::Error, request_id: Option<&str>) -> Response {
    if let Some(GatewayError::Generic {
        message,
        location,
        code,
    }) = error.downcast_ref::<GatewayError>()
    {
        error!(
            error_code = *code as u32,
            error_message = %message,
            error_location = ?location,
            request_id
        );
        return json_response(code.status(), *code, message, request_id);
    }

    let size_limit = error.downcast_ref::<SizedLimitError>();
    let error_mapping = [
        // Poem errors
        (
            error.is::<poem::error::NotFoundError>(),
            ErrorCode::ResourceNotFound,
        ),
        (
            error.is::<poem::error::ParsePathError>()
                || error.is::<poem::error::ParseQueryError>()
                || error.is::<poem::error::ParseJsonError>()
                || error.is::<poem::error::ParseMultipartError>()
                || matches!(size_limit, Some(SizedLimitError::MissingContentLength)),
            ErrorCode::InvalidParameter,
        ),
        (
            matches!(size_limit, Some(SizedLimitError::PayloadTooLarge)),
            ErrorCode::PayloadTooLarge,
        ),
        (
            error.is::<poem::error::MethodNotAllowedError>(),
            ErrorCode::MethodNotAllowed,
        ),
    ];

    // Find the first matching error type
    if let Some((_, error_code)) = error_mapping.iter().find(|(condition, _)| *condition) {
        return json_response(error.status(), *error_code, &error.to_string(), request_id);
    }
    // Handle other cases
    if error.has_source() {
        json_response(
            error.status(),
            ErrorCode::UnhandledPoemError,
            &error.to_string(),
            request_id,
        )
    } else {
        error.into_response()
    }
}

fn json_response(
    status: poem::http::StatusCode,
    code: ErrorCode,
    message: &str,
    request_id: Option<&str>,
) -> Response {
    Response::builder()
        .status(status)
        .content_type("application/json")
        .body(error_body(code, message, request_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raise_error;
    use poem::http::StatusCode;

    async fn body(response: Response) -> serde_json::Value {
        serde_json::from_str(&response.into_body().into_string().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn poem_errors_get_gateway_codes() {
        let response = error_handler(poem::error::NotFoundError.into())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["code"], 30000);

        let response = error_handler(poem::error::MethodNotAllowedError.into())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body(response).await["code"], 10090);
    }

    #[tokio::test]
    async fn gateway_errors_keep_their_own_code() {
        let error: poem::Error =
            raise_error!("Asset 'x' not found".into(), ErrorCode::ResourceNotFound).into();
        let response = error_handler(error).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["message"], "Asset 'x' not found");
    }

    #[tokio::test]
    async fn size_limit_errors_are_told_apart() {
        let response = error_handler(SizedLimitError::PayloadTooLarge.into())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body(response).await["code"], 10070);

        let response = error_handler(SizedLimitError::MissingContentLength.into())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
        assert_eq!(body(response).await["code"], 10000);
    }

    #[tokio::test]
    async fn request_id_is_attached_when_known() {
        let error: poem::Error =
            raise_error!("boom".into(), ErrorCode::InternalError).into();
        let response = render_error(error, Some("req-7"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await["requestId"], "req-7");

        let response = error_handler(poem::error::NotFoundError.into())
            .await
            .into_response();
        assert!(body(response).await.get("requestId").is_none());
    }
}

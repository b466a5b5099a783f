// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use poem::{
    handler,
    web::{Data, Json, Multipart},
    Result,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::modules::{
    common::{create_api_error_response, limit::UploadLimit},
    context::GatewayContext,
    error::code::ErrorCode,
    rest::multipart::receive_data,
};

/// Subject id carried by every issued session token. There is a single operator account.
pub const OPERATOR_ID: u64 = 1;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// Exchanges the operator credentials for a session token.
///
/// Expects a multipart body whose `data` field is `{"user": .., "password": ..}`.
#[handler]
pub async fn login(
    context: Data<&Arc<GatewayContext>>,
    limit: Data<&UploadLimit>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let form: LoginForm = receive_data(multipart, **limit).await?;
    if !context.login.matches(&form.user, &form.password) {
        warn!(user = %form.user, "Rejected login attempt");
        return Err(create_api_error_response(
            "Invalid login",
            ErrorCode::PermissionDenied,
        ));
    }
    let token = context.session_keys.issue(OPERATOR_ID)?;
    info!(user = %form.user, "Session token issued");
    Ok(Json(json!({ "auth": true, "token": token })))
}

/// Tokens are stateless; the client simply drops its copy.
#[handler]
pub fn logout() -> Json<Value> {
    Json(json!({ "auth": false, "token": null }))
}

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
use tracing::{debug, info};

use crate::modules::{
    common::{auth::SessionContext, create_api_error_response, limit::UploadLimit},
    context::GatewayContext,
    error::{code::ErrorCode, GatewayResult},
    mail::{composer::SendOutcome, upload::UploadBatch},
    rest::multipart::receive_form,
};

#[derive(Debug, Default, Deserialize)]
pub struct SendMailForm {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sendto: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndTicketForm {
    #[serde(default)]
    pub sendto: String,
}

#[handler]
pub fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World!" }))
}

/// Sends `data` = `{subject, body, sendto}` with every `file[]` part attached.
#[handler]
pub async fn send_mail(
    context: Data<&Arc<GatewayContext>>,
    session: SessionContext,
    limit: Data<&UploadLimit>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let mut batch = UploadBatch::new();
    let outcome = async {
        let form: SendMailForm = receive_form(multipart, &context.uploads_dir, **limit, &mut batch).await?;
        info!(
            operator = session.claims.id,
            recipient = %form.sendto,
            files = batch.len(),
            "Send request received"
        );
        context
            .send_mail(&form.subject, &form.body, &form.sendto, batch.files())
            .await
    }
    .await;
    release(batch).await;
    respond(outcome)
}

/// Sends the canned ticket-closed mail to `data` = `{sendto}`.
#[handler]
pub async fn end_ticket(
    context: Data<&Arc<GatewayContext>>,
    session: SessionContext,
    limit: Data<&UploadLimit>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let mut batch = UploadBatch::new();
    let outcome = async {
        let form: EndTicketForm = receive_form(multipart, &context.uploads_dir, **limit, &mut batch).await?;
        info!(
            operator = session.claims.id,
            recipient = %form.sendto,
            "End-ticket request received"
        );
        context.send_end_ticket(&form.sendto, batch.files()).await
    }
    .await;
    release(batch).await;
    respond(outcome)
}

async fn release(batch: UploadBatch) {
    if batch.is_empty() {
        return;
    }
    let summary = batch.release_all().await;
    debug!(
        removed = summary.removed,
        failed = summary.failed,
        "Uploads released"
    );
}

fn respond(outcome: GatewayResult<SendOutcome>) -> Result<Json<Value>> {
    match outcome? {
        SendOutcome::Sent => Ok(Json(json!({ "message": "Success" }))),
        SendOutcome::RecipientRejected => Err(create_api_error_response(
            "Recipient is not a valid email address",
            ErrorCode::InvalidParameter,
        )),
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use poem::{
    handler,
    web::{Data, Json},
    Result,
};

use crate::modules::{context::GatewayContext, graph::model::InboxMessage};

/// Latest 25 inbox messages of the delegated mailbox.
#[handler]
pub async fn inbox(context: Data<&Arc<GatewayContext>>) -> Result<Json<Vec<InboxMessage>>> {
    Ok(Json(context.list_inbox().await?))
}

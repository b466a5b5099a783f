// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    gateway_version,
    modules::{
        error::{code::ErrorCode, GatewayResult},
        graph::model::{GraphErrorResponse, GraphUser, InboxMessage, InboxPage, SendMailRequest},
        mail::{composer::MailTransport, message::OutboundMessage},
    },
    raise_error,
};

const INBOX_PAGE_SIZE: &str = "25";

/// Bearer token of the delegated session.
#[derive(Clone)]
pub struct DelegatedToken {
    secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DelegatedToken {
    pub fn new(secret: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { secret, expires_at }
    }
}

impl fmt::Debug for DelegatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Microsoft Graph client bound to one delegated session.
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: DelegatedToken,
}

impl GraphClient {
    pub fn new(base_url: &str, token: DelegatedToken, timeout: Duration) -> GatewayResult<Self> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(format!("graphmail-gateway/{}", gateway_version!()))
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| {
                raise_error!(
                    format!("Failed to build HTTP client: {:#?}", e),
                    ErrorCode::InternalError
                )
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Raw bearer token. Only meant for startup diagnostics.
    pub fn access_token_for_diagnostics(&self) -> &str {
        &self.token.secret
    }

    pub fn token(&self) -> &DelegatedToken {
        &self.token
    }

    pub async fn get_user(&self) -> GatewayResult<GraphUser> {
        self.get_json(
            "get user",
            "/me",
            &[("$select", "displayName,mail,userPrincipalName")],
        )
        .await
    }

    /// Most recent inbox messages, newest first.
    pub async fn list_inbox(&self) -> GatewayResult<Vec<InboxMessage>> {
        let page: InboxPage = self
            .get_json(
                "list inbox",
                "/me/mailFolders/inbox/messages",
                &[
                    ("$select", "from,isRead,receivedDateTime,subject"),
                    ("$top", INBOX_PAGE_SIZE),
                    ("$orderby", "receivedDateTime DESC"),
                ],
            )
            .await?;
        Ok(page.value)
    }

    pub async fn submit_message(&self, message: &OutboundMessage) -> GatewayResult<()> {
        let response = self
            .http
            .post(self.url("/me/sendMail"))
            .bearer_auth(&self.token.secret)
            .json(&SendMailRequest { message })
            .send()
            .await
            .map_err(|e| transport_error("send mail", e))?;
        check_status("send mail", response).await?;
        info!(
            recipients = message.to_recipients.len(),
            attachments = message.attachments.len(),
            "Graph accepted the message"
        );
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<T> {
        debug!(operation, path, "Calling Microsoft Graph");
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(&self.token.secret)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        let response = check_status(operation, response).await?;
        response.json::<T>().await.map_err(|e| {
            raise_error!(
                format!("Graph {} returned an unexpected body: {}", operation, e),
                ErrorCode::GraphApiCallFailed
            )
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl MailTransport for GraphClient {
    async fn send(&self, message: &OutboundMessage) -> GatewayResult<()> {
        self.submit_message(message).await
    }
}

fn transport_error(operation: &str, error: reqwest::Error) -> crate::modules::error::GatewayError {
    let reason = if error.is_timeout() { "timed out" } else { "failed" };
    raise_error!(
        format!("Graph {} {}: {}", operation, reason, error),
        ErrorCode::NetworkError
    )
}

async fn check_status(operation: &str, response: reqwest::Response) -> GatewayResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<GraphErrorResponse>(&body) {
        Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.message),
        Err(_) => body,
    };
    let code = match status {
        StatusCode::UNAUTHORIZED => ErrorCode::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::TooManyRequest,
        _ => ErrorCode::GraphApiCallFailed,
    };
    Err(raise_error!(
        format!("Graph {} failed with status {}: {}", operation, status, detail),
        code
    ))
}

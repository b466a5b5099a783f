// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use tracing::{info, warn};

use crate::modules::{
    common::validator::is_valid_recipient,
    error::GatewayResult,
    mail::{
        asset::AssetStore,
        attachment::read_attachments,
        message::{compose_html_body, OutboundMessage},
        upload::UploadedFile,
    },
};

/// Hands a finished message to the mail provider.
pub trait MailTransport {
    async fn send(&self, message: &OutboundMessage) -> GatewayResult<()>;
}

#[derive(Clone, Debug)]
pub struct ComposeOptions {
    /// Asset appended to every body.
    pub signature_asset: String,
    /// Optional asset prefixed to every body.
    pub head_asset: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The recipient failed validation. Nothing was read and nothing was sent.
    RecipientRejected,
}

pub struct MailComposer<'a, T> {
    transport: &'a T,
    assets: &'a AssetStore,
    options: &'a ComposeOptions,
}

impl<'a, T: MailTransport> MailComposer<'a, T> {
    pub fn new(transport: &'a T, assets: &'a AssetStore, options: &'a ComposeOptions) -> Self {
        Self {
            transport,
            assets,
            options,
        }
    }

    /// Sends one HTML mail to a single recipient with the given files attached.
    ///
    /// The caller keeps ownership of `files` and is responsible for removing them
    /// once this returns, whatever the outcome.
    pub async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        files: &[UploadedFile],
    ) -> GatewayResult<SendOutcome> {
        if !is_valid_recipient(recipient) {
            warn!(recipient, "Recipient is not a valid email address, canceling send");
            return Ok(SendOutcome::RecipientRejected);
        }

        let message = self.compose(subject, body, recipient, files).await?;
        self.transport.send(&message).await?;
        info!(
            recipient,
            attachments = files.len(),
            "Mail sent"
        );
        Ok(SendOutcome::Sent)
    }

    /// Reads attachments and assets concurrently and assembles the message.
    pub async fn compose(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        files: &[UploadedFile],
    ) -> GatewayResult<OutboundMessage> {
        let head = async {
            match &self.options.head_asset {
                Some(name) => self.assets.read_asset(name).await.map(Some),
                None => Ok(None),
            }
        };
        let (attachments, signature, head) = tokio::try_join!(
            read_attachments(files),
            self.assets.read_asset(&self.options.signature_asset),
            head
        )?;

        Ok(OutboundMessage::html(
            subject,
            compose_html_body(head.as_deref(), body, &signature),
            recipient,
            attachments,
        ))
    }
}

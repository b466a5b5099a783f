// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

use crate::modules::mail::attachment::Attachment;

/// Separator between the caller's body and the signature.
pub const SIGNATURE_SEPARATOR: &str = "<br><br>";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub subject: String,
    pub body: MessageBody,
    pub to_recipients: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn html(
        subject: impl Into<String>,
        content: String,
        recipient: &str,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: MessageBody {
                content_type: BodyContentType::Html,
                content,
            },
            to_recipients: vec![Recipient::new(recipient)],
            attachments,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub content_type: BodyContentType,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyContentType {
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn new(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                address: address.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
}

/// `{head}{body}<br><br>{signature}`
pub fn compose_html_body(head: Option<&str>, body: &str, signature: &str) -> String {
    let head = head.unwrap_or_default();
    let mut content =
        String::with_capacity(head.len() + body.len() + SIGNATURE_SEPARATOR.len() + signature.len());
    content.push_str(head);
    content.push_str(body);
    content.push_str(SIGNATURE_SEPARATOR);
    content.push_str(signature);
    content
}

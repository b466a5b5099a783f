// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, body_string_contains, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use crate::modules::{
    error::code::ErrorCode,
    graph::{
        client::{DelegatedToken, GraphClient},
        credential::{
            CredentialManager, DelegatedSecret, DeviceCodeInfo, DeviceCodePrompt,
            ProviderEndpoints,
        },
    },
    mail::{
        attachment::{Attachment, FILE_ATTACHMENT_TYPE},
        message::OutboundMessage,
    },
    settings::identity::IdentityConfig,
};

fn identity() -> IdentityConfig {
    IdentityConfig::parse(
        r#"{
            "clientId": "client-1",
            "directory_id": "dir-1",
            "tenantId": "tenant-1",
            "graphUserScopes": ["user.read", "mail.send"]
        }"#,
    )
    .unwrap()
}

fn endpoints(server: &MockServer) -> ProviderEndpoints {
    ProviderEndpoints {
        authority_host: server.uri(),
        graph_base_url: format!("{}/v1.0", server.uri()),
        timeout: Duration::from_secs(5),
    }
}

fn token_body(token: &str) -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "access_token": token,
        "expires_in": 3600,
        "scope": "user.read mail.send"
    })
}

fn graph_client(server: &MockServer) -> GraphClient {
    GraphClient::new(
        &format!("{}/v1.0", server.uri()),
        DelegatedToken::new("token-1".into(), None),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[derive(Default)]
struct RecordingPrompt {
    shown: Mutex<Vec<DeviceCodeInfo>>,
}

impl DeviceCodePrompt for RecordingPrompt {
    fn display_code(&self, info: &DeviceCodeInfo) {
        self.shown.lock().unwrap().push(info.clone());
    }
}

#[tokio::test]
async fn password_grant_yields_an_authenticated_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dir-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=mailbox%40contoso.com"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("scope=user.read+mail.send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("token-1")))
        .expect(1)
        .mount(&server)
        .await;

    let secret = DelegatedSecret::password(Some("mailbox@contoso.com"), Some("s3cret")).unwrap();
    let manager = CredentialManager::new(identity(), secret, endpoints(&server)).unwrap();
    assert!(!manager.is_interactive());

    let client = manager.acquire().await.unwrap();
    assert_eq!(client.access_token_for_diagnostics(), "token-1");
    assert!(client.token().expires_at.is_some_and(|at| at > chrono::Utc::now()));
}

#[tokio::test]
async fn rejected_password_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dir-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS50126: Error validating credentials due to invalid username or password."
        })))
        .mount(&server)
        .await;

    let secret = DelegatedSecret::password(Some("mailbox@contoso.com"), Some("wrong")).unwrap();
    let manager = CredentialManager::new(identity(), secret, endpoints(&server)).unwrap();
    let err = manager.acquire().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthenticationFailed);
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn device_code_grant_shows_the_code_then_polls_for_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/devicecode"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 1,
            "message": "To sign in, use a web browser to open https://microsoft.com/devicelogin and enter the code ABCD-EFGH"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("device_code=dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("device-token")))
        .mount(&server)
        .await;

    let prompt = Arc::new(RecordingPrompt::default());
    let manager = CredentialManager::new(
        identity(),
        DelegatedSecret::DeviceCode(prompt.clone()),
        endpoints(&server),
    )
    .unwrap();
    assert!(manager.is_interactive());

    let client = manager.acquire().await.unwrap();
    assert_eq!(client.access_token_for_diagnostics(), "device-token");

    let shown = prompt.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].user_code, "ABCD-EFGH");
    assert_eq!(shown[0].verification_uri, "https://microsoft.com/devicelogin");
    assert_eq!(shown[0].expires_in, Duration::from_secs(900));
    assert!(shown[0].instructions().contains("ABCD-EFGH"));
}

#[test]
fn password_flow_requires_both_username_and_password() {
    let err = DelegatedSecret::password(Some("mailbox@contoso.com"), None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingConfiguration);
    let err = DelegatedSecret::password(Some("  "), Some("x")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingConfiguration);
}

#[test]
fn incomplete_identity_is_rejected_before_any_network_call() {
    let mut config = identity();
    config.tenant_id.clear();
    let endpoints = ProviderEndpoints {
        authority_host: "http://127.0.0.1:1".into(),
        graph_base_url: "http://127.0.0.1:1/v1.0".into(),
        timeout: Duration::from_secs(1),
    };
    let err = CredentialManager::new(
        config,
        DelegatedSecret::DeviceCode(Arc::new(RecordingPrompt::default())),
        endpoints,
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingConfiguration);
}

fn sample_message() -> OutboundMessage {
    OutboundMessage::html(
        "Quarterly report",
        "Hello<br><br><p>Regards</p>".into(),
        "alice@example.com",
        vec![Attachment {
            odata_type: FILE_ATTACHMENT_TYPE.into(),
            name: "report.pdf".into(),
            content_type: Some("application/pdf".into()),
            content_bytes: "JVBERi0=".into(),
        }],
    )
}

#[tokio::test]
async fn send_mail_posts_the_graph_message_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/me/sendMail"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_partial_json(json!({
            "message": {
                "subject": "Quarterly report",
                "body": { "contentType": "html", "content": "Hello<br><br><p>Regards</p>" },
                "toRecipients": [{ "emailAddress": { "address": "alice@example.com" } }],
                "attachments": [{
                    "@odata.type": "#microsoft.graph.fileAttachment",
                    "name": "report.pdf",
                    "contentType": "application/pdf",
                    "contentBytes": "JVBERi0="
                }]
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    graph_client(&server)
        .submit_message(&sample_message())
        .await
        .unwrap();
}

#[tokio::test]
async fn graph_failures_map_to_error_codes() {
    let cases = [
        (401, ErrorCode::AuthenticationFailed),
        (429, ErrorCode::TooManyRequest),
        (500, ErrorCode::GraphApiCallFailed),
    ];
    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/me/sendMail"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": { "code": "ErrorSendAsDenied", "message": "Denied" }
            })))
            .mount(&server)
            .await;

        let err = graph_client(&server)
            .submit_message(&sample_message())
            .await
            .unwrap_err();
        assert_eq!(err.code(), expected, "status {}", status);
        assert!(err.to_string().contains("ErrorSendAsDenied"));
    }
}

#[tokio::test]
async fn unreachable_graph_is_a_network_error() {
    let client = GraphClient::new(
        "http://127.0.0.1:1/v1.0",
        DelegatedToken::new("token-1".into(), None),
        Duration::from_secs(2),
    )
    .unwrap();
    let err = client.submit_message(&sample_message()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetworkError);
}

#[tokio::test]
async fn get_user_selects_the_profile_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(query_param("$select", "displayName,mail,userPrincipalName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "displayName": "Support Desk",
            "userPrincipalName": "support@contoso.com"
        })))
        .mount(&server)
        .await;

    let user = graph_client(&server).get_user().await.unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Support Desk"));
    assert_eq!(user.email(), Some("support@contoso.com"));
}

#[tokio::test]
async fn list_inbox_returns_the_latest_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/mailFolders/inbox/messages"))
        .and(query_param("$top", "25"))
        .and(query_param("$orderby", "receivedDateTime DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "id": "m-2",
                    "subject": "Re: ticket",
                    "isRead": false,
                    "receivedDateTime": "2024-05-02T10:00:00Z",
                    "from": { "emailAddress": { "name": "Bob", "address": "bob@example.com" } }
                },
                { "id": "m-1", "subject": "ticket", "isRead": true }
            ]
        })))
        .mount(&server)
        .await;

    let messages = graph_client(&server).list_inbox().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject.as_deref(), Some("Re: ticket"));
    assert_eq!(messages[0].is_read, Some(false));
    assert_eq!(
        messages[0]
            .from
            .as_ref()
            .and_then(|f| f.email_address.address.as_deref()),
        Some("bob@example.com")
    );
    assert!(messages[1].from.is_none());
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::modules::{
    common::validator::is_valid_recipient,
    error::{code::ErrorCode, GatewayResult},
    graph::{
        client::GraphClient,
        credential::{CredentialManager, DelegatedSecret, DeviceCodePrompt, ProviderEndpoints},
        model::{GraphUser, InboxMessage},
    },
    mail::{
        asset::AssetStore,
        composer::{ComposeOptions, MailComposer, SendOutcome},
        upload::UploadedFile,
    },
    settings::{cli::Settings, dir::DataDirManager, identity::IdentityConfig},
    token::SessionKeys,
};

pub trait Initialize {
    async fn initialize() -> GatewayResult<()>;
}

/// Operator account accepted by `/login`.
#[derive(Clone, Default)]
pub struct LoginCredentials {
    username: Option<String>,
    password: Option<String>,
}

impl LoginCredentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self {
            username: username.filter(|u| !u.is_empty()),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Always false while either half is unconfigured.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => u == username && p == password,
            _ => false,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct EndTicketOptions {
    pub asset: String,
    pub subject: String,
}

/// Everything the HTTP handlers share: the delegated Graph session plus the
/// file and token configuration.
pub struct GatewayContext {
    credentials: CredentialManager,
    client: RwLock<Arc<GraphClient>>,
    reacquiring: Mutex<()>,
    pub assets: AssetStore,
    pub compose: ComposeOptions,
    pub uploads_dir: PathBuf,
    pub session_keys: Arc<SessionKeys>,
    pub login: LoginCredentials,
    pub end_ticket: EndTicketOptions,
}

impl GatewayContext {
    /// Loads the identity settings and acquires the first delegated session.
    pub async fn build(
        settings: &Settings,
        dirs: &DataDirManager,
        prompt: Arc<dyn DeviceCodePrompt>,
    ) -> GatewayResult<Arc<Self>> {
        let identity = IdentityConfig::load(&dirs.identity_file).await?;
        let secret = DelegatedSecret::from_settings(settings, prompt)?;
        let credentials =
            CredentialManager::new(identity, secret, ProviderEndpoints::from_settings(settings))?;
        let session_keys = SessionKeys::new(
            settings.gateway_jwt_secret.as_deref(),
            settings.gateway_session_ttl_seconds,
        )?;
        let login = LoginCredentials::new(
            settings.gateway_login_username.clone(),
            settings.gateway_login_password.clone(),
        );
        if !login.is_configured() {
            warn!("Login username or password is not configured, /login will reject every attempt");
        }

        let assets = AssetStore::new(&dirs.assets_dir);
        info!(
            uploads = ?dirs.uploads_dir,
            "Reading assets from {:?}",
            assets.root()
        );

        Self::start(
            credentials,
            assets,
            ComposeOptions {
                signature_asset: settings.gateway_signature_asset.clone(),
                head_asset: settings.gateway_head_asset.clone(),
            },
            dirs.uploads_dir.clone(),
            Arc::new(session_keys),
            login,
            EndTicketOptions {
                asset: settings.gateway_end_ticket_asset.clone(),
                subject: settings.gateway_end_ticket_subject.clone(),
            },
        )
        .await
    }

    pub async fn start(
        credentials: CredentialManager,
        assets: AssetStore,
        compose: ComposeOptions,
        uploads_dir: PathBuf,
        session_keys: Arc<SessionKeys>,
        login: LoginCredentials,
        end_ticket: EndTicketOptions,
    ) -> GatewayResult<Arc<Self>> {
        let client = credentials.acquire().await?;
        Ok(Arc::new(Self {
            credentials,
            client: RwLock::new(Arc::new(client)),
            reacquiring: Mutex::new(()),
            assets,
            compose,
            uploads_dir,
            session_keys,
            login,
            end_ticket,
        }))
    }

    pub async fn client(&self) -> Arc<GraphClient> {
        self.client.read().await.clone()
    }

    pub async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        files: &[UploadedFile],
    ) -> GatewayResult<SendOutcome> {
        let client = self.client().await;
        let composer = MailComposer::new(client.as_ref(), &self.assets, &self.compose);
        let result = composer.send_mail(subject, body, recipient, files).await;
        self.recover_session(&client, &result).await;
        result
    }

    /// Sends the canned end-ticket body. The recipient is checked before the asset is read.
    pub async fn send_end_ticket(
        &self,
        recipient: &str,
        files: &[UploadedFile],
    ) -> GatewayResult<SendOutcome> {
        if !is_valid_recipient(recipient) {
            warn!(recipient, "Recipient is not a valid email address, canceling send");
            return Ok(SendOutcome::RecipientRejected);
        }
        let body = self.assets.read_asset(&self.end_ticket.asset).await?;
        self.send_mail(&self.end_ticket.subject, &body, recipient, files)
            .await
    }

    pub async fn get_user(&self) -> GatewayResult<GraphUser> {
        let client = self.client().await;
        let result = client.get_user().await;
        self.recover_session(&client, &result).await;
        result
    }

    pub async fn list_inbox(&self) -> GatewayResult<Vec<InboxMessage>> {
        let client = self.client().await;
        let result = client.list_inbox().await;
        self.recover_session(&client, &result).await;
        result
    }

    /// After Graph rejects the bearer token, later requests get a fresh session.
    /// The failed call itself is not retried.
    async fn recover_session<T>(&self, used: &Arc<GraphClient>, result: &GatewayResult<T>) {
        let Err(e) = result else {
            return;
        };
        if e.code() != ErrorCode::AuthenticationFailed {
            return;
        }
        if self.credentials.is_interactive() {
            warn!(
                flow = %self.credentials.flow(),
                "Graph rejected the delegated session, restart the gateway to sign in again"
            );
            return;
        }
        if let Err(e) = self.reacquire(used).await {
            error!("Failed to re-acquire the delegated session: {}", e);
        }
    }

    /// Replaces `stale` with a new session unless another request already did.
    /// Readers keep the current client while the new session is acquired.
    pub async fn reacquire(&self, stale: &Arc<GraphClient>) -> GatewayResult<()> {
        let _serial = self.reacquiring.lock().await;
        if !Arc::ptr_eq(&*self.client.read().await, stale) {
            return Ok(());
        }
        let fresh = Arc::new(self.credentials.acquire().await?);
        *self.client.write().await = fresh;
        info!("Delegated session re-acquired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{graph::credential::TracingDeviceCodePrompt, settings::cli::GraphAuthFlow};
    use serde_json::json;
    use std::{path::Path, time::Duration};
    use tempfile::tempdir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn password_context(server: &MockServer, dir: &Path) -> Arc<GatewayContext> {
        let identity = IdentityConfig::parse(
            r#"{"clientId":"client-1","directory_id":"dir-1","graphUserScopes":["mail.read"]}"#,
        )
        .unwrap();
        let credentials = CredentialManager::new(
            identity,
            DelegatedSecret::password(Some("mailbox@contoso.com"), Some("pw")).unwrap(),
            ProviderEndpoints {
                authority_host: server.uri(),
                graph_base_url: format!("{}/v1.0", server.uri()),
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        GatewayContext::start(
            credentials,
            AssetStore::new(dir),
            ComposeOptions {
                signature_asset: "signature.html".into(),
                head_asset: None,
            },
            dir.to_path_buf(),
            Arc::new(SessionKeys::new(Some("secret"), 60).unwrap()),
            LoginCredentials::default(),
            EndTicketOptions {
                asset: "endTicket.html".into(),
                subject: "closed".into(),
            },
        )
        .await
        .unwrap()
    }

    fn token_response(token: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": token,
            "expires_in": 3600
        }))
    }

    #[test]
    fn login_requires_both_halves() {
        let login = LoginCredentials::new(Some("op".into()), Some("pw".into()));
        assert!(login.matches("op", "pw"));
        assert!(!login.matches("op", "nope"));
        assert!(!login.matches("", ""));

        let unset = LoginCredentials::new(Some("op".into()), Some(String::new()));
        assert!(!unset.is_configured());
        assert!(!unset.matches("op", ""));
    }

    #[tokio::test]
    async fn rejected_token_triggers_a_single_reacquire_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dir-1/oauth2/v2.0/token"))
            .respond_with(token_response("token-1"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/mailFolders/inbox/messages"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let context = password_context(&server, dir.path()).await;

        let before = context.client().await;
        let err = context.list_inbox().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthenticationFailed);
        let after = context.client().await;
        assert!(!Arc::ptr_eq(&before, &after));

        // Reacquiring with an outdated handle is a no-op.
        context.reacquire(&before).await.unwrap();
        assert!(Arc::ptr_eq(&after, &context.client().await));
    }

    #[tokio::test]
    async fn readers_keep_the_old_client_while_a_session_is_acquired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dir-1/oauth2/v2.0/token"))
            .respond_with(token_response("token-1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dir-1/oauth2/v2.0/token"))
            .respond_with(token_response("token-2").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let context = password_context(&server, dir.path()).await;
        let stale = context.client().await;

        let pending = tokio::spawn({
            let context = context.clone();
            let stale = stale.clone();
            async move { context.reacquire(&stale).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let during = tokio::time::timeout(Duration::from_millis(500), context.client())
            .await
            .expect("client() must not wait for the token request");
        assert!(Arc::ptr_eq(&during, &stale));

        pending.await.unwrap().unwrap();
        let after = context.client().await;
        assert_eq!(after.access_token_for_diagnostics(), "token-2");
    }

    #[tokio::test]
    async fn build_fails_fast_on_missing_identity_file() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::new_for_test();
        settings.gateway_graph_auth_flow = GraphAuthFlow::Password;
        settings.gateway_outlook_username = Some("mailbox@contoso.com".into());
        settings.gateway_outlook_password = Some("pw".into());
        let dirs = DataDirManager::new(
            dir.path().to_path_buf(),
            "appSettings.json",
            "assets",
            "uploads",
        );
        let result =
            GatewayContext::build(&settings, &dirs, Arc::new(TracingDeviceCodePrompt)).await;
        match result {
            Err(e) => assert_eq!(e.code(), ErrorCode::MissingConfiguration),
            Ok(_) => panic!("expected a configuration error"),
        }
    }
}

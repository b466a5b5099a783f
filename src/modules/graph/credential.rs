// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{fmt, sync::Arc, time::Duration};

use chrono::Utc;
use oauth2::{
    basic::BasicClient, AuthType, ClientId, ClientSecret, DeviceAuthorizationResponse,
    DeviceAuthorizationUrl, ErrorResponse, ExtraDeviceAuthorizationFields, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    modules::{
        error::{code::ErrorCode, GatewayError, GatewayResult},
        graph::client::{DelegatedToken, GraphClient},
        settings::{
            cli::{GraphAuthFlow, Settings},
            identity::IdentityConfig,
        },
    },
    raise_error,
};

/// What the user has to do to complete a device-code sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: Duration,
    /// Ready-made instruction text, when the identity platform provides one.
    pub message: Option<String>,
}

impl DeviceCodeInfo {
    pub fn instructions(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!(
                "To sign in, open {} and enter the code {}",
                self.verification_uri, self.user_code
            ),
        }
    }
}

/// Shows the device code to whoever operates the gateway.
pub trait DeviceCodePrompt: Send + Sync {
    fn display_code(&self, info: &DeviceCodeInfo);
}

/// Writes the sign-in instructions to the server log.
pub struct TracingDeviceCodePrompt;

impl DeviceCodePrompt for TracingDeviceCodePrompt {
    fn display_code(&self, info: &DeviceCodeInfo) {
        info!(
            expires_in_seconds = info.expires_in.as_secs(),
            "{}",
            info.instructions()
        );
    }
}

/// Azure returns a human readable `message` next to the standard fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AzureDeviceCodeFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExtraDeviceAuthorizationFields for AzureDeviceCodeFields {}

/// The user secret a delegated session is bootstrapped from.
#[derive(Clone)]
pub enum DelegatedSecret {
    Password { username: String, password: String },
    DeviceCode(Arc<dyn DeviceCodePrompt>),
}

impl fmt::Debug for DelegatedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegatedSecret::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            DelegatedSecret::DeviceCode(_) => f.write_str("DeviceCode"),
        }
    }
}

impl DelegatedSecret {
    pub fn from_settings(
        settings: &Settings,
        prompt: Arc<dyn DeviceCodePrompt>,
    ) -> GatewayResult<Self> {
        match settings.gateway_graph_auth_flow {
            GraphAuthFlow::Password => Self::password(
                settings.gateway_outlook_username.as_deref(),
                settings.gateway_outlook_password.as_deref(),
            ),
            GraphAuthFlow::DeviceCode => Ok(DelegatedSecret::DeviceCode(prompt)),
        }
    }

    pub fn password(username: Option<&str>, password: Option<&str>) -> GatewayResult<Self> {
        match (
            username.filter(|u| !u.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(password)) => Ok(DelegatedSecret::Password {
                username: username.trim().to_string(),
                password: password.to_string(),
            }),
            _ => Err(raise_error!(
                "Username and password must be provided for the password flow".into(),
                ErrorCode::MissingConfiguration
            )),
        }
    }

    pub fn flow(&self) -> GraphAuthFlow {
        match self {
            DelegatedSecret::Password { .. } => GraphAuthFlow::Password,
            DelegatedSecret::DeviceCode(_) => GraphAuthFlow::DeviceCode,
        }
    }
}

/// Where the identity platform and Graph live, plus the timeout for both.
#[derive(Clone, Debug)]
pub struct ProviderEndpoints {
    pub authority_host: String,
    pub graph_base_url: String,
    pub timeout: Duration,
}

impl ProviderEndpoints {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            authority_host: settings.gateway_authority_host.clone(),
            graph_base_url: settings.gateway_graph_base_url.clone(),
            timeout: Duration::from_secs(settings.gateway_provider_timeout_seconds),
        }
    }
}

/// Turns the identity configuration and a user secret into an authenticated [`GraphClient`].
#[derive(Debug)]
pub struct CredentialManager {
    identity: IdentityConfig,
    secret: DelegatedSecret,
    endpoints: ProviderEndpoints,
}

impl CredentialManager {
    pub fn new(
        identity: IdentityConfig,
        secret: DelegatedSecret,
        endpoints: ProviderEndpoints,
    ) -> GatewayResult<Self> {
        identity.validate(secret.flow())?;
        Ok(Self {
            identity,
            secret,
            endpoints,
        })
    }

    /// A device-code session needs a human, so it is never re-acquired behind the user's back.
    pub fn is_interactive(&self) -> bool {
        matches!(self.secret, DelegatedSecret::DeviceCode(_))
    }

    pub fn flow(&self) -> GraphAuthFlow {
        self.secret.flow()
    }

    pub async fn acquire(&self) -> GatewayResult<GraphClient> {
        let token = match &self.secret {
            DelegatedSecret::Password { username, password } => {
                self.password_grant(username, password).await?
            }
            DelegatedSecret::DeviceCode(prompt) => self.device_code_grant(prompt.as_ref()).await?,
        };
        info!(
            flow = %self.secret.flow(),
            expires_at = ?token.expires_at,
            "Delegated Graph session acquired"
        );
        GraphClient::new(
            &self.endpoints.graph_base_url,
            token,
            self.endpoints.timeout,
        )
    }

    async fn password_grant(&self, username: &str, password: &str) -> GatewayResult<DelegatedToken> {
        let mut client = BasicClient::new(ClientId::new(self.identity.client_id.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url(&self.identity.directory_id)?);
        if let Some(secret) = self.identity.client_secret() {
            client = client.set_client_secret(ClientSecret::new(secret.to_string()));
        }
        let http_client = self.build_http_client()?;

        debug!(username, "Requesting delegated token with the password grant");
        let response = client
            .exchange_password(
                &ResourceOwnerUsername::new(username.to_string()),
                &ResourceOwnerPassword::new(password.to_string()),
            )
            .add_scopes(self.scopes())
            .request_async(&http_client)
            .await
            .map_err(token_error)?;

        Ok(DelegatedToken::from_response(&response))
    }

    async fn device_code_grant(&self, prompt: &dyn DeviceCodePrompt) -> GatewayResult<DelegatedToken> {
        let tenant = &self.identity.tenant_id;
        let device_url = DeviceAuthorizationUrl::new(format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.endpoints.authority_host, tenant
        ))
        .map_err(|e| {
            raise_error!(
                format!("Invalid device authorization URL: {}", e),
                ErrorCode::MissingConfiguration
            )
        })?;
        let mut client = BasicClient::new(ClientId::new(self.identity.client_id.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_device_authorization_url(device_url)
            .set_token_uri(self.token_url(tenant)?);
        if let Some(secret) = self.identity.client_secret() {
            client = client.set_client_secret(ClientSecret::new(secret.to_string()));
        }
        let http_client = self.build_http_client()?;

        let details: DeviceAuthorizationResponse<AzureDeviceCodeFields> = client
            .exchange_device_code()
            .add_scopes(self.scopes())
            .request_async(&http_client)
            .await
            .map_err(token_error)?;

        prompt.display_code(&DeviceCodeInfo {
            user_code: details.user_code().secret().to_string(),
            verification_uri: details.verification_uri().url().to_string(),
            expires_in: details.expires_in(),
            message: details.extra_fields().message.clone(),
        });

        let response = client
            .exchange_device_access_token(&details)
            .request_async(&http_client, tokio::time::sleep, None)
            .await
            .map_err(token_error)?;

        Ok(DelegatedToken::from_response(&response))
    }

    fn token_url(&self, tenant: &str) -> GatewayResult<TokenUrl> {
        TokenUrl::new(format!(
            "{}/{}/oauth2/v2.0/token",
            self.endpoints.authority_host, tenant
        ))
        .map_err(|e| {
            raise_error!(
                format!("Invalid token endpoint URL: {}", e),
                ErrorCode::MissingConfiguration
            )
        })
    }

    fn scopes(&self) -> Vec<Scope> {
        self.identity.scopes.iter().cloned().map(Scope::new).collect()
    }

    fn build_http_client(&self) -> GatewayResult<reqwest::Client> {
        oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .timeout(self.endpoints.timeout)
            .build()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }
}

impl DelegatedToken {
    fn from_response<R: TokenResponse>(response: &R) -> Self {
        let expires_at = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        DelegatedToken::new(response.access_token().secret().to_string(), expires_at)
    }
}

fn token_error<RE, TE>(error: RequestTokenError<RE, TE>) -> GatewayError
where
    RE: std::error::Error + 'static,
    TE: ErrorResponse + 'static,
{
    match error {
        RequestTokenError::ServerResponse(response) => raise_error!(
            format!("Identity platform rejected the credential: {}", response),
            ErrorCode::AuthenticationFailed
        ),
        RequestTokenError::Request(e) => raise_error!(
            format!("Identity platform is unreachable: {}", e),
            ErrorCode::NetworkError
        ),
        RequestTokenError::Parse(e, _) => raise_error!(
            format!("Unexpected token response from the identity platform: {}", e),
            ErrorCode::AuthenticationFailed
        ),
        RequestTokenError::Other(message) => {
            raise_error!(message, ErrorCode::AuthenticationFailed)
        }
    }
}

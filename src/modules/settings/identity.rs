// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    modules::{
        error::{code::ErrorCode, GatewayResult},
        settings::cli::GraphAuthFlow,
    },
    raise_error,
};

/// Application registration used to obtain delegated Graph tokens.
///
/// Field names follow the `appSettings.json` layout the front-end deployment
/// already ships with; the camelCase spellings are accepted as aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(rename = "clientId", default)]
    pub client_id: String,
    #[serde(
        rename = "client_secret",
        alias = "clientSecret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<String>,
    #[serde(rename = "directory_id", alias = "directoryId", default)]
    pub directory_id: String,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: String,
    #[serde(rename = "graphUserScopes", alias = "scopes", default)]
    pub scopes: Vec<String>,
}

impl IdentityConfig {
    pub async fn load(path: &Path) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            raise_error!(
                format!("Unable to read identity settings {:?}: {}", path, e),
                ErrorCode::MissingConfiguration
            )
        })?;
        let config = Self::parse(&content)?;
        info!(
            client_id = %config.client_id,
            scopes = ?config.scopes,
            "Loaded identity settings from {:?}",
            path
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> GatewayResult<Self> {
        let mut config: IdentityConfig = serde_json::from_str(content).map_err(|e| {
            raise_error!(
                format!("Identity settings are not valid JSON: {}", e),
                ErrorCode::MissingConfiguration
            )
        })?;
        config.dedup_scopes();
        Ok(config)
    }

    /// Scopes form an ordered set: first occurrence wins.
    fn dedup_scopes(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.scopes = std::mem::take(&mut self.scopes)
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
            .collect();
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }

    pub fn validate(&self, flow: GraphAuthFlow) -> GatewayResult<()> {
        require(&self.client_id, "clientId")?;
        if self.scopes.is_empty() {
            return Err(raise_error!(
                "Setting 'graphUserScopes' cannot be empty".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        match flow {
            GraphAuthFlow::Password => require(&self.directory_id, "directory_id"),
            GraphAuthFlow::DeviceCode => require(&self.tenant_id, "tenantId"),
        }
    }
}

fn require(value: &str, name: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(raise_error!(
            format!("Setting '{}' cannot be empty", name),
            ErrorCode::MissingConfiguration
        ));
    }
    Ok(())
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    modules::error::{code::ErrorCode, GatewayResult},
    raise_error, utc_now,
};

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: u64,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the HS256 session tokens handed out by `/login`.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: Option<&str>, ttl_seconds: u64) -> GatewayResult<Self> {
        let secret = secret.filter(|s| !s.is_empty()).ok_or_else(|| {
            raise_error!(
                "A session signing secret must be configured (gateway_jwt_secret)".into(),
                ErrorCode::MissingConfiguration
            )
        })?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        })
    }

    pub fn issue(&self, id: u64) -> GatewayResult<String> {
        let iat = utc_now!();
        let claims = SessionClaims {
            id,
            iat,
            exp: iat + self.ttl_seconds as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            raise_error!(
                format!("Failed to sign session token: {}", e),
                ErrorCode::InternalError
            )
        })
    }

    pub fn verify(&self, token: &str) -> GatewayResult<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                raise_error!(
                    format!("Failed to authenticate token: {}", e),
                    ErrorCode::PermissionDenied
                )
            })
    }
}

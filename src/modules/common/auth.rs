// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::{error::code::ErrorCode, token::SessionKeys};
use poem::{
    http::header::AUTHORIZATION, Endpoint, FromRequest, Middleware, Request, RequestBody, Result,
};
use std::sync::Arc;

use super::create_api_error_response;
use crate::modules::token::SessionClaims;

/// Rejects requests without a valid session token and exposes the verified
/// claims to handlers as request data.
#[derive(Clone)]
pub struct SessionGuard {
    keys: Arc<SessionKeys>,
}

impl SessionGuard {
    pub fn new(keys: Arc<SessionKeys>) -> Self {
        Self { keys }
    }
}

pub struct SessionGuardEndpoint<E> {
    ep: E,
    keys: Arc<SessionKeys>,
}

impl<E: Endpoint> Middleware<E> for SessionGuard {
    type Output = SessionGuardEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        SessionGuardEndpoint {
            ep,
            keys: self.keys.clone(),
        }
    }
}

impl<E: Endpoint> Endpoint for SessionGuardEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, mut req: Request) -> Result<Self::Output> {
        let token = extract_token(&req).ok_or_else(|| {
            create_api_error_response("No token provided.", ErrorCode::PermissionDenied)
        })?;
        let claims = self.keys.verify(&token)?;
        req.set_data(SessionContext { claims });
        self.ep.call(req).await
    }
}

/// Accepts both a raw token and `Bearer <token>` in the `Authorization` header.
fn extract_token(req: &Request) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[derive(Clone, Debug)]
pub struct SessionContext {
    pub claims: SessionClaims,
}

impl<'a> FromRequest<'a> for SessionContext {
    async fn from_request(req: &'a Request, _body: &mut RequestBody) -> Result<Self> {
        req.data::<SessionContext>().cloned().ok_or_else(|| {
            create_api_error_response("Authorization required", ErrorCode::PermissionDenied)
        })
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{
    num::NonZeroU32,
    sync::LazyLock,
    time::{Duration, Instant},
};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use poem::{
    http::{HeaderValue, StatusCode},
    web::RealIp,
    Endpoint, FromRequest, IntoResponse, Middleware, Request, Response, Result,
};
use tracing::{error, info, warn, Instrument};

use crate::generate_token;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
const MAX_REQUEST_ID_LEN: usize = 64;

/// Id of the current request, stored in the request extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Access-log cost units available per second.
const ACCESS_LOG_BUDGET: NonZeroU32 = NonZeroU32::MIN.saturating_add(19);

static ACCESS_LOG_LIMITER: LazyLock<AccessLogLimiter> =
    LazyLock::new(|| AccessLogLimiter::new(ACCESS_LOG_BUDGET));

/// Throttles access-log lines. A success costs five units, a client error three
/// and a server error one, so failures are what remains visible under load.
pub struct AccessLogLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl AccessLogLimiter {
    pub fn new(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    pub fn permit(&self, status: StatusCode) -> bool {
        let cost = if status.is_server_error() {
            NonZeroU32::MIN
        } else if status.is_client_error() {
            NonZeroU32::MIN.saturating_add(2)
        } else {
            NonZeroU32::MIN.saturating_add(4)
        };
        self.limiter.check_n(cost).is_ok_and(|r| r.is_ok())
    }
}

/// Runs each request inside a `request` span and writes one access-log line
/// when it completes. The request id (taken from `X-Request-Id` or generated)
/// is echoed back on the response.
pub struct Tracing;

impl<E: Endpoint> Middleware<E> for Tracing {
    type Output = TracingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        TracingEndpoint { inner: ep }
    }
}

pub struct TracingEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for TracingEndpoint<E> {
    type Output = Response;

    async fn call(&self, mut req: Request) -> Result<Self::Output> {
        let request_id = req
            .header(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| generate_token!(64));
        let remote_addr = RealIp::from_request_without_body(&req)
            .await
            .ok()
            .and_then(|real_ip| real_ip.0)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| req.remote_addr().to_string());

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let span = tracing::info_span!(
            "request",
            id = %request_id,
            remote_addr = %remote_addr,
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            let started = Instant::now();
            match self.inner.call(req).await {
                Ok(resp) => {
                    let mut resp = resp.into_response();
                    access_log(resp.status(), started.elapsed());
                    if let Ok(value) = HeaderValue::from_str(&request_id) {
                        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
                    }
                    Ok(resp)
                }
                Err(err) => {
                    access_log(err.status(), started.elapsed());
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn access_log(status: StatusCode, elapsed: Duration) {
    if !ACCESS_LOG_LIMITER.permit(status) {
        return;
    }
    let code = status.as_u16();
    if status.is_server_error() {
        error!(status = code, ?elapsed, "request failed");
    } else if status.is_client_error() {
        warn!(status = code, ?elapsed, "request rejected");
    } else {
        info!(status = code, ?elapsed, "request completed");
    }
}

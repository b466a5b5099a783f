// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::common::auth::SessionGuard;
use crate::modules::common::error::ErrorCapture;
use crate::modules::common::limit::UploadLimit;
use crate::modules::common::log::{Tracing, REQUEST_ID_HEADER};
use crate::modules::common::timeout::{Timeout, TIMEOUT_HEADER};
use crate::modules::context::GatewayContext;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::handler::error_handler;
use crate::modules::error::GatewayResult;
use crate::modules::settings::cli::{Settings, SETTINGS};
use crate::modules::utils::shutdown::shutdown_signal;
use crate::raise_error;
use api::inbox::inbox;
use api::mail::{end_ticket, root, send_mail};
use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Compression, Cors};
use poem::{get, post, Endpoint, EndpointExt, Route, Server};
use public::login::{login, logout};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod api;
pub mod multipart;
pub mod public;


/// Application routes with the per-request middleware stack. Only the
/// multipart routes carry the upload limit.
pub fn create_routes(context: Arc<GatewayContext>, settings: &Settings) -> impl Endpoint {
    let guard = SessionGuard::new(context.session_keys.clone());
    let limit = UploadLimit::new(settings.gateway_max_upload_bytes);

    Route::new()
        .at("/login", post(login.with(limit)))
        .at("/logout", post(logout))
        .at(
            "/",
            get(root.with(guard.clone())).post(send_mail.with(limit).with(guard.clone())),
        )
        .at(
            "/endTicket",
            post(end_ticket.with(limit).with(guard.clone())),
        )
        .at("/inbox", get(inbox.with(guard)))
        .with(Timeout::new(settings.gateway_request_timeout_seconds))
        .with(ErrorCapture)
        .with(Tracing)
        .data(context)
}

pub async fn start_http_server(context: Arc<GatewayContext>) -> GatewayResult<()> {
    let listener = TcpListener::bind((
        SETTINGS.gateway_bind_ip.clone(),
        SETTINGS.gateway_http_port,
    ));

    let mut cors_origins = SETTINGS.gateway_cors_origins.clone();
    if cors_origins.is_empty() {
        cors_origins = ["*".to_string()].into_iter().collect();
    }

    let cors = Cors::new()
        .allow_origins(cors_origins)
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type", "Authorization", TIMEOUT_HEADER])
        .expose_headers(vec![REQUEST_ID_HEADER])
        .max_age(SETTINGS.gateway_cors_max_age);

    let route = create_routes(context, &SETTINGS)
        .with(cors)
        .with_if(
            SETTINGS.gateway_http_compression_enabled,
            Compression::new(),
        )
        .with(CatchPanic::new());

    let server = Server::new(listener)
        .name("GraphMail Gateway")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            route.catch_all_error(error_handler),
            shutdown_signal(),
            Some(Duration::from_secs(5)),
        );
    info!(
        "GraphMail Gateway is now listening on {}:{}",
        SETTINGS.gateway_bind_ip, SETTINGS.gateway_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}

use std::sync::Arc;

use mimalloc::MiMalloc;
use modules::{
    context::{GatewayContext, Initialize},
    error::GatewayResult,
    graph::credential::TracingDeviceCodePrompt,
    logger,
    rest::start_http_server,
    settings::{
        cli::SETTINGS,
        dir::{DataDirManager, DATA_DIR_MANAGER},
    },
};
use tracing::{info, warn};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> GatewayResult<()> {
    logger::initialize_logging();
    info!("Starting graphmail-gateway");
    info!("Version:  {}", gateway_version!());
    info!("Auth flow: {}", SETTINGS.gateway_graph_auth_flow);

    let context = match initialize().await {
        Ok(context) => context,
        Err(error) => {
            eprintln!("{:?}", error);
            return Err(error);
        }
    };

    greet_user(&context).await;
    start_http_server(context).await
}

/// Prepares the data directories and acquires the delegated Graph session.
async fn initialize() -> GatewayResult<Arc<GatewayContext>> {
    DataDirManager::initialize().await?;
    GatewayContext::build(
        &SETTINGS,
        &DATA_DIR_MANAGER,
        Arc::new(TracingDeviceCodePrompt),
    )
    .await
}

async fn greet_user(context: &GatewayContext) {
    match context.get_user().await {
        Ok(user) => {
            info!(
                "Hello, {}!",
                user.display_name.as_deref().unwrap_or("unknown user")
            );
            info!("Email: {}", user.email().unwrap_or("NO EMAIL"));
        }
        Err(e) => warn!("Unable to read the signed-in user's profile: {}", e),
    }

    let client = context.client().await;
    if let Some(expires_at) = client.token().expires_at {
        info!("Delegated session valid until {}", expires_at);
    }
    if SETTINGS.gateway_log_access_token {
        info!("User token: {}", client.access_token_for_diagnostics());
    }
}

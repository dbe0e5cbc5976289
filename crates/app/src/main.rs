mod api;
mod auth;
mod checkout;
#[cfg(test)]
mod fixtures;
mod problem;
mod router;
mod telemetry;
mod webhook;

use std::{net::SocketAddr, sync::Arc};

use reqwest::Client;
use tracing::info;

use store_admin_storage::Database;
use store_admin_stripe::CheckoutClient;
use store_admin_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", "database ready");

    let http = Client::builder().build()?;
    let checkout = CheckoutClient::new(
        config.stripe_api_key.clone(),
        config.stripe_api_base.clone(),
        http,
    );
    let state = router::AppState::new(
        metrics,
        database,
        Arc::from(config.stripe_webhook_secret.as_bytes()),
        checkout,
        auth::AuthTokenValidator::new(config.auth_token_secret.as_bytes()),
        config.frontend_store_url.clone(),
    );

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use url::Url;

use store_admin_storage::Database;
use store_admin_stripe::CheckoutClient;

use crate::api::{self, Billboards, Categories, Products};
use crate::auth::AuthTokenValidator;
use crate::{checkout, telemetry, webhook};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    webhook_secret: Arc<[u8]>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    checkout: CheckoutClient,
    token_validator: AuthTokenValidator,
    frontend_store_url: Url,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        webhook_secret: Arc<[u8]>,
        checkout: CheckoutClient,
        token_validator: AuthTokenValidator,
        frontend_store_url: Url,
    ) -> Self {
        Self {
            metrics,
            storage,
            webhook_secret,
            clock: Arc::new(Utc::now),
            checkout,
            token_validator,
            frontend_store_url,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn webhook_secret(&self) -> Arc<[u8]> {
        self.webhook_secret.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn checkout(&self) -> &CheckoutClient {
        &self.checkout
    }

    pub fn token_validator(&self) -> &AuthTokenValidator {
        &self.token_validator
    }

    pub fn frontend_store_url(&self) -> &Url {
        &self.frontend_store_url
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/webhook", post(webhook::handle))
        .route("/api/stores", get(api::list_stores).post(api::create_store))
        .route(
            "/api/stores/:store_id",
            get(api::get_store)
                .patch(api::update_store)
                .delete(api::delete_store),
        )
        .route(
            "/api/:store_id/billboards",
            get(api::list_entities::<Billboards>).post(api::create_entity::<Billboards>),
        )
        .route(
            "/api/:store_id/billboards/:billboard_id",
            get(api::get_entity::<Billboards>)
                .patch(api::update_entity::<Billboards>)
                .delete(api::delete_entity::<Billboards>),
        )
        .route(
            "/api/:store_id/categories",
            get(api::list_entities::<Categories>).post(api::create_entity::<Categories>),
        )
        .route(
            "/api/:store_id/categories/:category_id",
            get(api::get_entity::<Categories>)
                .patch(api::update_entity::<Categories>)
                .delete(api::delete_entity::<Categories>),
        )
        .route(
            "/api/:store_id/products",
            get(api::list_products).post(api::create_entity::<Products>),
        )
        .route(
            "/api/:store_id/products/:product_id",
            get(api::get_entity::<Products>)
                .patch(api::update_entity::<Products>)
                .delete(api::delete_entity::<Products>),
        )
        .route("/api/:store_id/orders", get(api::list_orders))
        .route(
            "/api/:store_id/checkout",
            post(checkout::create_session)
                .options(checkout::preflight)
                .layer(checkout::cors_layer()),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

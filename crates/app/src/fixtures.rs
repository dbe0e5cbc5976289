//! Shared setup for handler tests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use store_admin_core::{BillboardInput, CategoryInput, ProductInput, StoreInput};
use store_admin_storage::Database;
use store_admin_stripe::CheckoutClient;

use crate::auth::{AuthTokenValidator, TokenClaims};
use crate::router::{app_router, AppState};
use crate::telemetry;

pub const USER_ID: &str = "user_1";
pub const OTHER_USER_ID: &str = "user_2";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const TOKEN_SECRET: &[u8] = b"token-secret";
pub const FRONTEND_URL: &str = "http://store.example";

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Session token for `user_id`, valid for an hour after [`fixed_now`].
pub fn token_for(user_id: &str) -> String {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: (fixed_now() + Duration::hours(1)).timestamp(),
        nbf: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TOKEN_SECRET),
    )
    .expect("encode token")
}

pub struct TestContext {
    pub state: AppState,
    pub database: Database,
}

/// Builds state over a fresh in-memory database. Checkout requests go to `stripe_base`.
pub async fn setup(stripe_base: Option<Url>) -> TestContext {
    let metrics = telemetry::init_metrics().expect("metrics init");
    let database = Database::connect("sqlite::memory:?cache=shared")
        .await
        .expect("connect");
    database.run_migrations().await.expect("migrations");

    let stripe_base = stripe_base
        .unwrap_or_else(|| Url::parse("http://127.0.0.1:9/v1/").expect("url"));
    let checkout = CheckoutClient::new(
        "sk_test_123",
        stripe_base,
        Client::builder().build().expect("client"),
    );

    let now = fixed_now();
    let state = AppState::new(
        metrics,
        database.clone(),
        Arc::from(WEBHOOK_SECRET.as_bytes()),
        checkout,
        AuthTokenValidator::new(TOKEN_SECRET),
        Url::parse(FRONTEND_URL).expect("url"),
    )
    .with_clock(Arc::new(move || now));

    TestContext { state, database }
}

pub struct SeededStore {
    pub store_id: String,
    pub billboard_id: String,
    pub category_id: String,
    pub product_ids: Vec<String>,
}

/// Creates a store for `user_id` with one billboard, one category and the given products.
pub async fn seed_store(database: &Database, user_id: &str, products: &[(&str, i64)]) -> SeededStore {
    let now = fixed_now();
    let store = database
        .stores()
        .create(
            user_id,
            &StoreInput {
                name: "Shop".to_string(),
            },
            now,
        )
        .await
        .expect("store");
    let billboard = database
        .billboards()
        .create(
            &store.id,
            &BillboardInput {
                label: "Summer".to_string(),
                image_url: "https://cdn.example/summer.png".to_string(),
            },
            now,
        )
        .await
        .expect("billboard");
    let category = database
        .categories()
        .create(
            &store.id,
            &CategoryInput {
                name: "Shirts".to_string(),
                billboard_id: billboard.id.clone(),
            },
            now,
        )
        .await
        .expect("category");

    let mut product_ids = Vec::new();
    for (name, price_cents) in products {
        let product = database
            .products()
            .create(
                &store.id,
                &ProductInput {
                    name: name.to_string(),
                    price_cents: *price_cents,
                    category_id: category.id.clone(),
                    ..ProductInput::default()
                },
                now,
            )
            .await
            .expect("product");
        product_ids.push(product.id);
    }

    SeededStore {
        store_id: store.id,
        billboard_id: billboard.id,
        category_id: category.id,
        product_ids,
    }
}

/// Builds a request with an optional bearer token and JSON body.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request")
}

pub async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
    app_router(state.clone())
        .oneshot(request)
        .await
        .expect("handler should respond")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should read")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8")
}

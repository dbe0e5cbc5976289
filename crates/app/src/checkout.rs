use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use url::Url;

use store_admin_stripe::{CheckoutLineItem, CreateSessionRequest};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// The storefront runs on another origin and calls this route from the browser.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub async fn preflight() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    product_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    url: String,
}

/// Creates an unpaid order for the cart and returns the hosted payment page.
pub async fn create_session(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ProblemResponse> {
    let result = start_checkout(&state, &store_id, request.product_ids).await;
    let label = match &result {
        Ok(_) => "created",
        Err(problem) if problem.status().is_client_error() => "rejected",
        Err(_) => "failed",
    };
    counter!("checkout_sessions_total", "result" => label).increment(1);
    result
}

async fn start_checkout(
    state: &AppState,
    store_id: &str,
    product_ids: Vec<String>,
) -> Result<Json<CheckoutResponse>, ProblemResponse> {
    if product_ids.is_empty() {
        return Err(ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "Product ids are required",
        ));
    }

    let storage = state.storage();
    let products = storage.products().fetch_many(store_id, &product_ids).await?;
    let found: HashSet<&str> = products.iter().map(|product| product.id.as_str()).collect();
    if let Some(missing) = product_ids.iter().find(|id| !found.contains(id.as_str())) {
        return Err(ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "invalid_reference",
            format!("Unknown product {missing} for this store"),
        ));
    }

    let order = storage
        .orders()
        .create_with_items(store_id, &product_ids, state.now())
        .await?;

    let line_items: Vec<CheckoutLineItem> = products
        .iter()
        .map(|product| CheckoutLineItem::usd(product.name.clone(), product.price_cents))
        .collect();
    let success_url = cart_url(state.frontend_store_url(), "success");
    let cancel_url = cart_url(state.frontend_store_url(), "canceled");

    let session = state
        .checkout()
        .create_session(&CreateSessionRequest {
            line_items: &line_items,
            success_url: &success_url,
            cancel_url: &cancel_url,
            order_id: &order.id,
        })
        .await
        .map_err(|err| {
            error!(stage = "checkout", order_id = %order.id, error = %err, "failed to create checkout session");
            ProblemResponse::new(
                StatusCode::BAD_GATEWAY,
                "payment_provider_error",
                "Failed to create checkout session",
            )
        })?;

    let url = session.url.ok_or_else(|| {
        ProblemResponse::internal(format!("checkout session {} has no url", session.id))
    })?;
    info!(stage = "checkout", %store_id, order_id = %order.id, session_id = %session.id, "checkout session created");

    Ok(Json(CheckoutResponse { url }))
}

fn cart_url(base: &Url, flag: &str) -> String {
    format!("{}/cart?{flag}=1", base.as_str().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};
    use axum::body::Body;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::fixtures::{body_json, request, seed_store, send, setup, USER_ID};

    #[test]
    fn cart_urls_use_frontend_origin() {
        let base = Url::parse("http://store.example").expect("url");
        assert_eq!(cart_url(&base, "success"), "http://store.example/cart?success=1");
        let nested = Url::parse("https://example.com/shop/").expect("url");
        assert_eq!(cart_url(&nested, "canceled"), "https://example.com/shop/cart?canceled=1");
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let ctx = setup(None).await;
        let seeded = seed_store(&ctx.database, USER_ID, &[]).await;
        let response = send(
            &ctx.state,
            request(
                Method::POST,
                &format!("/api/{}/checkout", seeded.store_id),
                None,
                Some(json!({ "productIds": [] })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "Product ids are required");
    }

    #[tokio::test]
    async fn checkout_creates_order_and_session() {
        let server = MockServer::start_async().await;
        let ctx = setup(Some(Url::parse(&server.url("/v1/")).expect("url"))).await;
        let seeded = seed_store(&ctx.database, USER_ID, &[("Tee", 1500), ("Cap", 900)]).await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .x_www_form_urlencoded_tuple("success_url", "http://store.example/cart?success=1")
                    .x_www_form_urlencoded_tuple("cancel_url", "http://store.example/cart?canceled=1")
                    .x_www_form_urlencoded_tuple("phone_number_collection[enabled]", "true");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.example/cs_test_1"
                }));
            })
            .await;

        let response = send(
            &ctx.state,
            request(
                Method::POST,
                &format!("/api/{}/checkout", seeded.store_id),
                None,
                Some(json!({ "productIds": seeded.product_ids })),
            ),
        )
        .await;
        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["url"],
            "https://checkout.example/cs_test_1"
        );

        let summaries = ctx
            .database
            .orders()
            .list_summaries(&seeded.store_id)
            .await
            .expect("orders");
        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].is_paid);
        assert_eq!(summaries[0].products.len(), 2);
    }

    #[tokio::test]
    async fn unknown_product_is_rejected_before_payment() {
        let server = MockServer::start_async().await;
        let ctx = setup(Some(Url::parse(&server.url("/v1/")).expect("url"))).await;
        let seeded = seed_store(&ctx.database, USER_ID, &[("Tee", 1500)]).await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let response = send(
            &ctx.state,
            request(
                Method::POST,
                &format!("/api/{}/checkout", seeded.store_id),
                None,
                Some(json!({ "productIds": [seeded.product_ids[0], "nope"] })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn preflight_allows_any_origin() {
        let ctx = setup(None).await;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/store-1/checkout")
            .header("Origin", "http://store.example")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .expect("request");

        let response = send(&ctx.state, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
    }
}

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use metrics::{counter, histogram};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, warn};

use store_admin_core::{CompletedCheckout, EventParseError, PaymentEvent};
use store_admin_storage::{OrderError, PaymentEventError};

use crate::router::AppState;

const HEADER_SIGNATURE: &str = "Stripe-Signature";
/// Maximum age, in seconds, of a signed payload.
const SIGNATURE_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, Error)]
enum WebhookError {
    #[error("missing Stripe-Signature header")]
    MissingSignature,
    #[error("{0}")]
    Signature(String),
    #[error(transparent)]
    Payload(#[from] EventParseError),
    #[error("order {0} not found")]
    UnknownOrder(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to mark order paid: {0}")]
    Order(#[from] OrderError),
    #[error("failed to record event: {0}")]
    Event(#[from] PaymentEventError),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::Signature(_) | Self::Payload(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            return (status, "Webhook Error: internal error").into_response();
        }
        (status, format!("Webhook Error: {self}")).into_response()
    }
}

/// What happened to a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Applied { archived: u64 },
    Duplicate,
    Ignored,
}

pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let result = process(&state, &headers, &body).await;

    let label = match &result {
        Ok((label, _)) => *label,
        Err(_) => "rejected",
    };
    histogram!("webhook_ack_latency_seconds", "type" => label)
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            if err.status().is_server_error() {
                error!(stage = "webhook", error = %err, "failed to apply payment event");
            } else {
                warn!(stage = "webhook", error = %err, "rejected payment webhook");
            }
            err.into_response()
        }
    }
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(&'static str, Disposition), WebhookError> {
    let signature = headers
        .get(HEADER_SIGNATURE)
        .ok_or(WebhookError::MissingSignature)?
        .to_str()
        .map_err(|_| WebhookError::Signature("invalid Stripe-Signature header".to_string()))?;

    let secret = state.webhook_secret();
    verify_signature(&secret, body, signature, state.now()).map_err(|reason| {
        counter!("webhook_invalid_signature_total").increment(1);
        WebhookError::Signature(reason)
    })?;

    let event = PaymentEvent::parse(body)?;
    let label = event.metric_label();
    counter!("webhook_events_total", "type" => label).increment(1);

    let disposition = match &event {
        PaymentEvent::CheckoutCompleted(checkout) => apply_checkout(state, checkout).await?,
        PaymentEvent::Ignored { .. } => Disposition::Ignored,
    };

    match disposition {
        Disposition::Applied { archived } => {
            counter!("orders_paid_total").increment(1);
            counter!("products_archived_total").increment(archived);
        }
        Disposition::Duplicate => counter!("webhook_duplicate_total").increment(1),
        Disposition::Ignored => {}
    }
    info!(
        stage = "webhook",
        event_id = event.event_id(),
        event_type = event.event_type(),
        ?disposition,
        "payment event acknowledged"
    );

    Ok((label, disposition))
}

/// Marks the order paid, archives its products and records the event id.
/// Everything commits together or not at all.
async fn apply_checkout(
    state: &AppState,
    checkout: &CompletedCheckout,
) -> Result<Disposition, WebhookError> {
    let storage = state.storage();
    let events = storage.payment_events();
    let orders = storage.orders();
    let now = state.now();

    let mut tx = storage.begin().await?;
    if events.is_recorded(&mut tx, &checkout.event_id).await? {
        return Ok(Disposition::Duplicate);
    }

    let items = orders
        .mark_paid(&mut tx, &checkout.order_id, &checkout.address, &checkout.phone, now)
        .await
        .map_err(|err| match err {
            OrderError::NotFound => WebhookError::UnknownOrder(checkout.order_id.clone()),
            other => WebhookError::Order(other),
        })?;

    let mut product_ids: Vec<String> = items.into_iter().map(|item| item.product_id).collect();
    product_ids.sort();
    product_ids.dedup();
    let archived = orders.archive_products(&mut tx, &product_ids, now).await?;

    let outcome = events
        .record(
            &mut tx,
            &checkout.event_id,
            store_admin_core::CHECKOUT_COMPLETED,
            Some(&checkout.order_id),
            now,
        )
        .await?;
    if outcome.is_duplicate() {
        // A concurrent delivery of the same event committed first.
        tx.rollback().await?;
        return Ok(Disposition::Duplicate);
    }

    tx.commit().await?;
    Ok(Disposition::Applied { archived })
}

/// Checks a `t=<unix>,v1=<hex>[,v1=<hex>...]` header against `HMAC-SHA256(secret, "<t>.<body>")`.
fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> Result<(), String> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| "unable to extract timestamp from header".to_string())?;
    if candidates.is_empty() {
        return Err("no v1 signatures found in header".to_string());
    }
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| "timestamp is not a unix time".to_string())?;
    if now.timestamp().abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS {
        return Err("timestamp outside the tolerance zone".to_string());
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|_| "failed to initialize signature verifier".to_string())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected_bytes: &[u8] = expected.as_ref();

    let matched = candidates
        .iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|provided| bool::from(expected_bytes.ct_eq(provided.as_slice())));
    if matched {
        Ok(())
    } else {
        Err("no signatures found matching the expected signature for payload".to_string())
    }
}

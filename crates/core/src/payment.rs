use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::address::{format_address, ShippingAddress};

/// Event type emitted when a hosted checkout session has been paid.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Errors that can occur while turning a verified webhook body into a [`PaymentEvent`].
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("failed to parse payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Payment provider events the admin backend understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted(CompletedCheckout),
    /// Any other event type. Acknowledged without side effects.
    Ignored { event_id: String, event_type: String },
}

/// Data extracted from a completed checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub event_id: String,
    pub order_id: String,
    pub address: String,
    pub phone: String,
}

impl PaymentEvent {
    /// Parses a raw webhook body. The signature must already have been verified.
    pub fn parse(body: &[u8]) -> Result<Self, EventParseError> {
        let envelope: Envelope = serde_json::from_slice(body)?;
        let event_id = envelope
            .id
            .filter(|id| !id.is_empty())
            .ok_or(EventParseError::MissingField("id"))?;
        let event_type = envelope
            .event_type
            .filter(|value| !value.is_empty())
            .ok_or(EventParseError::MissingField("type"))?;

        if event_type != CHECKOUT_COMPLETED {
            return Ok(Self::Ignored {
                event_id,
                event_type,
            });
        }

        let object = envelope
            .data
            .map(|data| data.object)
            .ok_or(EventParseError::MissingField("data.object"))?;
        let session: CheckoutSessionObject = serde_json::from_value(object)?;

        let order_id = session
            .metadata
            .and_then(|metadata| metadata.order_id)
            .filter(|id| !id.is_empty())
            .ok_or(EventParseError::MissingField("data.object.metadata.orderId"))?;

        let details = session.customer_details.unwrap_or_default();
        let address = details
            .address
            .as_ref()
            .map(format_address)
            .unwrap_or_default();

        Ok(Self::CheckoutCompleted(CompletedCheckout {
            event_id,
            order_id,
            address,
            phone: details.phone.unwrap_or_default(),
        }))
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::CheckoutCompleted(checkout) => &checkout.event_id,
            Self::Ignored { event_id, .. } => event_id,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => CHECKOUT_COMPLETED,
            Self::Ignored { event_type, .. } => event_type,
        }
    }

    /// Short label used for metrics and logs.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted(_) => "checkout_completed",
            Self::Ignored { .. } => "ignored",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    metadata: Option<SessionMetadata>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "orderId", default)]
    order_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    address: Option<ShippingAddress>,
    #[serde(default)]
    phone: Option<String>,
}

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use url::Url;

/// Client for creating hosted checkout sessions with the payment provider.
#[derive(Clone)]
pub struct CheckoutClient {
    http: Client,
    base_url: Url,
    secret_key: String,
}

impl CheckoutClient {
    /// Creates a new client. `base_url` must end with a slash, e.g. `https://api.stripe.com/v1/`.
    pub fn new(secret_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            secret_key: secret_key.into(),
        }
    }

    /// Creates a one-off payment session and returns its hosted URL.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest<'_>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let url = self.base_url.join("checkout/sessions")?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&request.form_params())
            .send()
            .await?;

        parse_json(response).await
    }
}

/// Parameters of a checkout session.
pub struct CreateSessionRequest<'a> {
    pub line_items: &'a [CheckoutLineItem],
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub order_id: &'a str,
}

impl CreateSessionRequest<'_> {
    /// Flattens the request into the provider's bracketed form encoding.
    fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "billing_address_collection".to_string(),
                "required".to_string(),
            ),
            (
                "phone_number_collection[enabled]".to_string(),
                "true".to_string(),
            ),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            ("metadata[orderId]".to_string(), self.order_id.to_string()),
        ];

        for (index, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{index}]");
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            params.push((
                format!("{prefix}[price_data][currency]"),
                item.currency.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
        }

        params
    }
}

/// A single purchasable line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Amount in the currency's minor unit.
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
}

impl CheckoutLineItem {
    /// One unit priced in US cents.
    pub fn usd(name: impl Into<String>, unit_amount: i64) -> Self {
        Self {
            name: name.into(),
            unit_amount,
            currency: "usd".to_string(),
            quantity: 1,
        }
    }
}

/// Session returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Errors produced by the checkout client.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn parse_json<T>(response: Response) -> Result<T, CheckoutError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(CheckoutError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: &Url) -> CheckoutClient {
        CheckoutClient::new(
            "sk_test_123",
            base_url.clone(),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn create_session_posts_form_encoded_line_items() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("Authorization", "Bearer sk_test_123")
                    .x_www_form_urlencoded_tuple("mode", "payment")
                    .x_www_form_urlencoded_tuple("billing_address_collection", "required")
                    .x_www_form_urlencoded_tuple("phone_number_collection[enabled]", "true")
                    .x_www_form_urlencoded_tuple("metadata[orderId]", "order-1")
                    .x_www_form_urlencoded_tuple("line_items[0][price_data][unit_amount]", "1500")
                    .x_www_form_urlencoded_tuple(
                        "line_items[1][price_data][product_data][name]",
                        "Cap",
                    );
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.example/cs_test_1"
                }));
            })
            .await;

        let items = vec![
            CheckoutLineItem::usd("Tee", 1500),
            CheckoutLineItem::usd("Cap", 900),
        ];
        let session = client
            .create_session(&CreateSessionRequest {
                line_items: &items,
                success_url: "http://store.example/cart?success=1",
                cancel_url: "http://store.example/cart?canceled=1",
                order_id: "order-1",
            })
            .await
            .expect("create session");
        mock.assert_async().await;

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.example/cs_test_1")
        );
    }

    #[tokio::test]
    async fn error_status_returns_body() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/checkout/sessions");
                then.status(402).body("card_declined");
            })
            .await;

        let err = client
            .create_session(&CreateSessionRequest {
                line_items: &[],
                success_url: "http://store.example/cart?success=1",
                cancel_url: "http://store.example/cart?canceled=1",
                order_id: "order-2",
            })
            .await
            .expect_err("should error");
        match err {
            CheckoutError::Status { status, body } => {
                assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
                assert_eq!(body, "card_declined");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

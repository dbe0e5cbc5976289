use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use url::Url;

use store_admin_core::{Store, StoreInput};

/// Store-scoped collections exposed by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Billboards,
    Categories,
    Products,
}

impl Resource {
    /// Path segment used by both the API and the dashboard routes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Billboards => "billboards",
            Self::Categories => "categories",
            Self::Products => "products",
        }
    }
}

/// Client for the admin REST API, authenticated with the user's session token.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: Url, token: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    pub async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        let url = self.base_url.join("api/stores")?;
        let response = self.authorized_request(Method::GET, url).send().await?;
        parse_json(response).await
    }

    pub async fn create_store(&self, input: &StoreInput) -> Result<Store, ApiError> {
        let url = self.base_url.join("api/stores")?;
        let response = self
            .authorized_request(Method::POST, url)
            .json(input)
            .send()
            .await?;
        parse_json(response).await
    }

    /// `POST /api/{store}/{resource}`
    pub async fn create<B>(&self, store_id: &str, resource: Resource, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.collection_url(store_id, resource)?;
        let response = self
            .authorized_request(Method::POST, url)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// `PATCH /api/{store}/{resource}/{id}`
    pub async fn update<B>(
        &self,
        store_id: &str,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.item_url(store_id, resource, id)?;
        let response = self
            .authorized_request(Method::PATCH, url)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// `DELETE /api/{store}/{resource}/{id}`
    pub async fn delete(&self, store_id: &str, resource: Resource, id: &str) -> Result<(), ApiError> {
        let url = self.item_url(store_id, resource, id)?;
        let response = self.authorized_request(Method::DELETE, url).send().await?;
        ensure_success(response).await
    }

    fn collection_url(&self, store_id: &str, resource: Resource) -> Result<Url, ApiError> {
        Ok(self
            .base_url
            .join(&format!("api/{store_id}/{}", resource.as_str()))?)
    }

    fn item_url(&self, store_id: &str, resource: Resource, id: &str) -> Result<Url, ApiError> {
        Ok(self
            .base_url
            .join(&format!("api/{store_id}/{}/{id}", resource.as_str()))?)
    }

    fn authorized_request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }
}

/// Errors produced by the admin API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

async fn ensure_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ApiError::Status { status, body });
    }
    Ok(())
}

async fn parse_json<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ApiError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(
            Url::parse(&server.url("/")).expect("url"),
            "session-token",
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn list_stores_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/stores")
                    .header("Authorization", "Bearer session-token");
                then.status(200).json_body(json!([{
                    "id": "store-1",
                    "userId": "user_1",
                    "name": "Shop",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z"
                }]));
            })
            .await;

        let stores = client(&server).list_stores().await.expect("list stores");
        mock.assert_async().await;
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].name, "Shop");
    }

    #[tokio::test]
    async fn delete_reports_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/store-1/billboards/bb-1");
                then.status(409).body("conflict");
            })
            .await;

        let err = client(&server)
            .delete("store-1", Resource::Billboards, "bb-1")
            .await
            .expect_err("conflict");
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }
}

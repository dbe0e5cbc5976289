//! Admin REST handlers for stores, catalogue entities and orders.
//!
//! Reads of catalogue entities are public so the storefront can render them;
//! every write requires the signed-in owner of the store.

use axum::{
    async_trait,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use store_admin_core::{
    Billboard, BillboardInput, Category, CategoryInput, OrderSummary, Product, ProductInput,
    Store, StoreInput, Validate,
};
use store_admin_storage::{CatalogError, Database, ProductFilter};

use crate::auth::AuthUser;
use crate::problem::ProblemResponse;
use crate::router::AppState;

type ApiResult<T> = Result<T, ProblemResponse>;

fn record<T>(resource: &'static str, op: &'static str, result: &ApiResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(problem) if problem.status().is_client_error() => "rejected",
        Err(_) => "error",
    };
    counter!("api_requests_total", "resource" => resource, "op" => op, "result" => outcome)
        .increment(1);
}

pub async fn list_stores(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Store>>> {
    let result = state
        .storage()
        .stores()
        .list_for_user(&user.user_id)
        .await
        .map(Json)
        .map_err(ProblemResponse::from);
    record("stores", "list", &result);
    result
}

pub async fn create_store(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<StoreInput>,
) -> ApiResult<Json<Store>> {
    let result: ApiResult<Json<Store>> = async move {
        input.validate()?;
        let store = state
            .storage()
            .stores()
            .create(&user.user_id, &input, state.now())
            .await?;
        info!(stage = "api", store_id = %store.id, user_id = %user.user_id, "store created");
        Ok(Json(store))
    }
    .await;
    record("stores", "create", &result);
    result
}

pub async fn get_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Store>> {
    let result = user.owned_store(&state, &store_id).await.map(Json);
    record("stores", "get", &result);
    result
}

pub async fn update_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path(store_id): Path<String>,
    Json(input): Json<StoreInput>,
) -> ApiResult<Json<Store>> {
    let result: ApiResult<Json<Store>> = async move {
        input.validate()?;
        user.owned_store(&state, &store_id).await?;
        let store = state
            .storage()
            .stores()
            .rename(&store_id, &input, state.now())
            .await?;
        Ok(Json(store))
    }
    .await;
    record("stores", "update", &result);
    result
}

pub async fn delete_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path(store_id): Path<String>,
) -> ApiResult<StatusCode> {
    let result: ApiResult<StatusCode> = async move {
        user.owned_store(&state, &store_id).await?;
        state.storage().stores().delete(&store_id).await?;
        info!(stage = "api", %store_id, "store deleted");
        Ok(StatusCode::OK)
    }
    .await;
    record("stores", "delete", &result);
    result
}

/// A store-scoped catalogue collection served by the generic handlers below.
#[async_trait]
pub trait CatalogResource: Send + Sync + 'static {
    type Entity: Serialize + Send + 'static;
    type Input: Validate + DeserializeOwned + Send + Sync + 'static;

    /// Metric label and path segment.
    const NAME: &'static str;
    /// Used in not-found details.
    const SINGULAR: &'static str;

    async fn list(db: &Database, store_id: &str) -> Result<Vec<Self::Entity>, CatalogError>;
    async fn fetch(db: &Database, store_id: &str, id: &str) -> Result<Self::Entity, CatalogError>;
    async fn create(
        db: &Database,
        store_id: &str,
        input: &Self::Input,
        now: DateTime<Utc>,
    ) -> Result<Self::Entity, CatalogError>;
    async fn update(
        db: &Database,
        store_id: &str,
        id: &str,
        input: &Self::Input,
        now: DateTime<Utc>,
    ) -> Result<Self::Entity, CatalogError>;
    async fn delete(db: &Database, store_id: &str, id: &str) -> Result<(), CatalogError>;
}

pub struct Billboards;

#[async_trait]
impl CatalogResource for Billboards {
    type Entity = Billboard;
    type Input = BillboardInput;

    const NAME: &'static str = "billboards";
    const SINGULAR: &'static str = "Billboard";

    async fn list(db: &Database, store_id: &str) -> Result<Vec<Billboard>, CatalogError> {
        db.billboards().list(store_id).await
    }

    async fn fetch(db: &Database, store_id: &str, id: &str) -> Result<Billboard, CatalogError> {
        db.billboards().fetch(store_id, id).await
    }

    async fn create(
        db: &Database,
        store_id: &str,
        input: &BillboardInput,
        now: DateTime<Utc>,
    ) -> Result<Billboard, CatalogError> {
        db.billboards().create(store_id, input, now).await
    }

    async fn update(
        db: &Database,
        store_id: &str,
        id: &str,
        input: &BillboardInput,
        now: DateTime<Utc>,
    ) -> Result<Billboard, CatalogError> {
        db.billboards().update(store_id, id, input, now).await
    }

    async fn delete(db: &Database, store_id: &str, id: &str) -> Result<(), CatalogError> {
        db.billboards().delete(store_id, id).await
    }
}

pub struct Categories;

#[async_trait]
impl CatalogResource for Categories {
    type Entity = Category;
    type Input = CategoryInput;

    const NAME: &'static str = "categories";
    const SINGULAR: &'static str = "Category";

    async fn list(db: &Database, store_id: &str) -> Result<Vec<Category>, CatalogError> {
        db.categories().list(store_id).await
    }

    async fn fetch(db: &Database, store_id: &str, id: &str) -> Result<Category, CatalogError> {
        db.categories().fetch(store_id, id).await
    }

    async fn create(
        db: &Database,
        store_id: &str,
        input: &CategoryInput,
        now: DateTime<Utc>,
    ) -> Result<Category, CatalogError> {
        db.categories().create(store_id, input, now).await
    }

    async fn update(
        db: &Database,
        store_id: &str,
        id: &str,
        input: &CategoryInput,
        now: DateTime<Utc>,
    ) -> Result<Category, CatalogError> {
        db.categories().update(store_id, id, input, now).await
    }

    async fn delete(db: &Database, store_id: &str, id: &str) -> Result<(), CatalogError> {
        db.categories().delete(store_id, id).await
    }
}

pub struct Products;

#[async_trait]
impl CatalogResource for Products {
    type Entity = Product;
    type Input = ProductInput;

    const NAME: &'static str = "products";
    const SINGULAR: &'static str = "Product";

    async fn list(db: &Database, store_id: &str) -> Result<Vec<Product>, CatalogError> {
        db.products().list(store_id, &ProductFilter::default()).await
    }

    async fn fetch(db: &Database, store_id: &str, id: &str) -> Result<Product, CatalogError> {
        db.products().fetch(store_id, id).await
    }

    async fn create(
        db: &Database,
        store_id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        db.products().create(store_id, input, now).await
    }

    async fn update(
        db: &Database,
        store_id: &str,
        id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        db.products().update(store_id, id, input, now).await
    }

    async fn delete(db: &Database, store_id: &str, id: &str) -> Result<(), CatalogError> {
        db.products().delete(store_id, id).await
    }
}

fn entity_problem<R: CatalogResource>(err: CatalogError) -> ProblemResponse {
    match err {
        CatalogError::NotFound => ProblemResponse::not_found(R::SINGULAR),
        other => ProblemResponse::from(other),
    }
}

pub async fn list_entities<R: CatalogResource>(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Vec<R::Entity>>> {
    let result = R::list(state.storage(), &store_id)
        .await
        .map(Json)
        .map_err(entity_problem::<R>);
    record(R::NAME, "list", &result);
    result
}

pub async fn get_entity<R: CatalogResource>(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(String, String)>,
) -> ApiResult<Json<R::Entity>> {
    let result = R::fetch(state.storage(), &store_id, &id)
        .await
        .map(Json)
        .map_err(entity_problem::<R>);
    record(R::NAME, "get", &result);
    result
}

pub async fn create_entity<R: CatalogResource>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(store_id): Path<String>,
    Json(input): Json<R::Input>,
) -> ApiResult<Json<R::Entity>> {
    let result: ApiResult<Json<R::Entity>> = async move {
        input.validate()?;
        user.owned_store(&state, &store_id).await?;
        R::create(state.storage(), &store_id, &input, state.now())
            .await
            .map(Json)
            .map_err(entity_problem::<R>)
    }
    .await;
    record(R::NAME, "create", &result);
    result
}

pub async fn update_entity<R: CatalogResource>(
    State(state): State<AppState>,
    user: AuthUser,
    Path((store_id, id)): Path<(String, String)>,
    Json(input): Json<R::Input>,
) -> ApiResult<Json<R::Entity>> {
    let result: ApiResult<Json<R::Entity>> = async move {
        input.validate()?;
        user.owned_store(&state, &store_id).await?;
        R::update(state.storage(), &store_id, &id, &input, state.now())
            .await
            .map(Json)
            .map_err(entity_problem::<R>)
    }
    .await;
    record(R::NAME, "update", &result);
    result
}

pub async fn delete_entity<R: CatalogResource>(
    State(state): State<AppState>,
    user: AuthUser,
    Path((store_id, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let result: ApiResult<StatusCode> = async move {
        user.owned_store(&state, &store_id).await?;
        R::delete(state.storage(), &store_id, &id)
            .await
            .map_err(entity_problem::<R>)?;
        info!(stage = "api", resource = R::NAME, %store_id, %id, "entity deleted");
        Ok(StatusCode::OK)
    }
    .await;
    record(R::NAME, "delete", &result);
    result
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    is_featured: Option<bool>,
    #[serde(default)]
    include_archived: Option<bool>,
}

/// Public product listing. Archived products are only listed for the store owner.
pub async fn list_products(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(store_id): Path<String>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let result: ApiResult<Json<Vec<Product>>> = async move {
        let include_archived = query.include_archived.unwrap_or(false);
        if include_archived {
            let user = user.ok_or_else(ProblemResponse::unauthorized)?;
            user.owned_store(&state, &store_id).await?;
        }

        let filter = ProductFilter {
            category_id: query.category_id.filter(|id| !id.is_empty()),
            featured_only: query.is_featured.unwrap_or(false),
            include_archived,
        };
        let products = state.storage().products().list(&store_id, &filter).await?;
        Ok(Json(products))
    }
    .await;
    record("products", "list", &result);
    result
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Vec<OrderSummary>>> {
    let result: ApiResult<Json<Vec<OrderSummary>>> = async move {
        user.owned_store(&state, &store_id).await?;
        let summaries = state.storage().orders().list_summaries(&store_id).await?;
        Ok(Json(summaries))
    }
    .await;
    record("orders", "list", &result);
    result
}

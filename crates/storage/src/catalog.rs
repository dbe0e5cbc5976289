use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

use store_admin_core::{
    Billboard, BillboardInput, Category, CategoryInput, Product, ProductInput, Store, StoreInput,
};

use crate::{is_foreign_key_violation, new_id, to_rfc3339};

/// Errors produced by the store catalogue repositories.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("record not found")]
    NotFound,
    #[error("record is still referenced by dependent rows")]
    Conflict,
    #[error("referenced {0} does not exist in this store")]
    InvalidReference(&'static str),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

fn map_delete_error(err: sqlx::Error) -> CatalogError {
    if is_foreign_key_violation(&err) {
        CatalogError::Conflict
    } else {
        CatalogError::Database(err)
    }
}

fn map_write_error(reference: &'static str) -> impl Fn(sqlx::Error) -> CatalogError {
    move |err| {
        if is_foreign_key_violation(&err) {
            CatalogError::InvalidReference(reference)
        } else {
            CatalogError::Database(err)
        }
    }
}

/// Repository for stores.
#[derive(Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

impl StoreRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a store owned by `user_id`.
    pub async fn create(
        &self,
        user_id: &str,
        input: &StoreInput,
        now: DateTime<Utc>,
    ) -> Result<Store, CatalogError> {
        let row = sqlx::query_as::<_, StoreRow>(
            "INSERT INTO stores (id, user_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, user_id, name, created_at, updated_at",
        )
        .bind(new_id())
        .bind(user_id)
        .bind(input.name.trim())
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Lists the stores of a user, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Store>, CatalogError> {
        let rows = sqlx::query_as::<_, StoreRow>(
            "SELECT id, user_id, name, created_at, updated_at FROM stores \
             WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Store::from).collect())
    }

    pub async fn fetch(&self, store_id: &str) -> Result<Store, CatalogError> {
        sqlx::query_as::<_, StoreRow>(
            "SELECT id, user_id, name, created_at, updated_at FROM stores WHERE id = ?",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Store::from)
        .ok_or(CatalogError::NotFound)
    }

    pub async fn rename(
        &self,
        store_id: &str,
        input: &StoreInput,
        now: DateTime<Utc>,
    ) -> Result<Store, CatalogError> {
        sqlx::query_as::<_, StoreRow>(
            "UPDATE stores SET name = ?, updated_at = ? WHERE id = ? \
             RETURNING id, user_id, name, created_at, updated_at",
        )
        .bind(input.name.trim())
        .bind(to_rfc3339(now))
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Store::from)
        .ok_or(CatalogError::NotFound)
    }

    /// Deletes a store. Fails with [`CatalogError::Conflict`] while it still owns records.
    pub async fn delete(&self, store_id: &str) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM stores WHERE id = ?")
            .bind(store_id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: String,
    user_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for billboards, always scoped by store.
#[derive(Clone)]
pub struct BillboardRepository {
    pool: SqlitePool,
}

const BILLBOARD_COLUMNS: &str = "id, store_id, label, image_url, created_at, updated_at";

impl BillboardRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        store_id: &str,
        input: &BillboardInput,
        now: DateTime<Utc>,
    ) -> Result<Billboard, CatalogError> {
        let row = sqlx::query_as::<_, BillboardRow>(&format!(
            "INSERT INTO billboards (id, store_id, label, image_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {BILLBOARD_COLUMNS}"
        ))
        .bind(new_id())
        .bind(store_id)
        .bind(input.label.trim())
        .bind(input.image_url.trim())
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error("store"))?;

        Ok(row.into())
    }

    pub async fn list(&self, store_id: &str) -> Result<Vec<Billboard>, CatalogError> {
        let rows = sqlx::query_as::<_, BillboardRow>(&format!(
            "SELECT {BILLBOARD_COLUMNS} FROM billboards \
             WHERE store_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Billboard::from).collect())
    }

    pub async fn fetch(&self, store_id: &str, id: &str) -> Result<Billboard, CatalogError> {
        sqlx::query_as::<_, BillboardRow>(&format!(
            "SELECT {BILLBOARD_COLUMNS} FROM billboards WHERE id = ? AND store_id = ?"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Billboard::from)
        .ok_or(CatalogError::NotFound)
    }

    pub async fn update(
        &self,
        store_id: &str,
        id: &str,
        input: &BillboardInput,
        now: DateTime<Utc>,
    ) -> Result<Billboard, CatalogError> {
        sqlx::query_as::<_, BillboardRow>(&format!(
            "UPDATE billboards SET label = ?, image_url = ?, updated_at = ? \
             WHERE id = ? AND store_id = ? RETURNING {BILLBOARD_COLUMNS}"
        ))
        .bind(input.label.trim())
        .bind(input.image_url.trim())
        .bind(to_rfc3339(now))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Billboard::from)
        .ok_or(CatalogError::NotFound)
    }

    /// Deletes a billboard. Categories still pointing at it make this a conflict.
    pub async fn delete(&self, store_id: &str, id: &str) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM billboards WHERE id = ? AND store_id = ?")
            .bind(id)
            .bind(store_id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillboardRow {
    id: String,
    store_id: String,
    label: String,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BillboardRow> for Billboard {
    fn from(row: BillboardRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            label: row.label,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for categories, always scoped by store.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

const CATEGORY_COLUMNS: &str = "id, store_id, billboard_id, name, created_at, updated_at";

impl CategoryRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        store_id: &str,
        input: &CategoryInput,
        now: DateTime<Utc>,
    ) -> Result<Category, CatalogError> {
        ensure_in_store(&self.pool, "billboards", "billboard", store_id, &input.billboard_id)
            .await?;

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO categories (id, store_id, billboard_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(new_id())
        .bind(store_id)
        .bind(&input.billboard_id)
        .bind(input.name.trim())
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error("billboard"))?;

        Ok(row.into())
    }

    pub async fn list(&self, store_id: &str) -> Result<Vec<Category>, CatalogError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE store_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn fetch(&self, store_id: &str, id: &str) -> Result<Category, CatalogError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ? AND store_id = ?"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Category::from)
        .ok_or(CatalogError::NotFound)
    }

    pub async fn update(
        &self,
        store_id: &str,
        id: &str,
        input: &CategoryInput,
        now: DateTime<Utc>,
    ) -> Result<Category, CatalogError> {
        ensure_in_store(&self.pool, "billboards", "billboard", store_id, &input.billboard_id)
            .await?;

        sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE categories SET name = ?, billboard_id = ?, updated_at = ? \
             WHERE id = ? AND store_id = ? RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(&input.billboard_id)
        .bind(to_rfc3339(now))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error("billboard"))?
        .map(Category::from)
        .ok_or(CatalogError::NotFound)
    }

    /// Deletes a category. Products still filed under it make this a conflict.
    pub async fn delete(&self, store_id: &str, id: &str) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ? AND store_id = ?")
            .bind(id)
            .bind(store_id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    store_id: String,
    billboard_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            billboard_id: row.billboard_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Listing filters for products.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<String>,
    pub featured_only: bool,
    pub include_archived: bool,
}

/// Repository for products, always scoped by store.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

const PRODUCT_COLUMNS: &str =
    "id, store_id, category_id, name, price_cents, is_featured, is_archived, created_at, updated_at";

impl ProductRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        store_id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        ensure_in_store(&self.pool, "categories", "category", store_id, &input.category_id)
            .await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products \
             (id, store_id, category_id, name, price_cents, is_featured, is_archived, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(new_id())
        .bind(store_id)
        .bind(&input.category_id)
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(input.is_featured)
        .bind(input.is_archived)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error("category"))?;

        Ok(row.into())
    }

    pub async fn list(
        &self,
        store_id: &str,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, CatalogError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = "
        ));
        builder.push_bind(store_id);
        if let Some(category_id) = &filter.category_id {
            builder.push(" AND category_id = ");
            builder.push_bind(category_id.as_str());
        }
        if filter.featured_only {
            builder.push(" AND is_featured = 1");
        }
        if !filter.include_archived {
            builder.push(" AND is_archived = 0");
        }
        builder.push(" ORDER BY created_at DESC, id ASC");

        let rows = builder
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Loads the listed products of a store, ignoring unknown ids.
    pub async fn fetch_many(
        &self,
        store_id: &str,
        ids: &[String],
    ) -> Result<Vec<Product>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = "
        ));
        builder.push_bind(store_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows = builder
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn fetch(&self, store_id: &str, id: &str) -> Result<Product, CatalogError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND store_id = ?"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::from)
        .ok_or(CatalogError::NotFound)
    }

    pub async fn update(
        &self,
        store_id: &str,
        id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        ensure_in_store(&self.pool, "categories", "category", store_id, &input.category_id)
            .await?;

        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET name = ?, price_cents = ?, category_id = ?, \
             is_featured = ?, is_archived = ?, updated_at = ? \
             WHERE id = ? AND store_id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(&input.category_id)
        .bind(input.is_featured)
        .bind(input.is_archived)
        .bind(to_rfc3339(now))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error("category"))?
        .map(Product::from)
        .ok_or(CatalogError::NotFound)
    }

    /// Deletes a product. Products referenced by orders cannot be deleted.
    pub async fn delete(&self, store_id: &str, id: &str) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND store_id = ?")
            .bind(id)
            .bind(store_id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    store_id: String,
    category_id: String,
    name: String,
    price_cents: i64,
    is_featured: bool,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            category_id: row.category_id,
            name: row.name,
            price_cents: row.price_cents,
            is_featured: row.is_featured,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// `table` is always a compile-time constant from this module.
async fn ensure_in_store(
    pool: &SqlitePool,
    table: &'static str,
    reference: &'static str,
    store_id: &str,
    id: &str,
) -> Result<(), CatalogError> {
    let found: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT 1 FROM {table} WHERE id = ? AND store_id = ?"
    ))
    .bind(id)
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    found
        .map(|_| ())
        .ok_or(CatalogError::InvalidReference(reference))
}

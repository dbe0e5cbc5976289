mod catalog;
mod events;
mod orders;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

pub use catalog::{
    BillboardRepository, CatalogError, CategoryRepository, ProductFilter, ProductRepository,
    StoreRepository,
};
pub use events::{PaymentEventError, PaymentEventRepository, RecordOutcome};
pub use orders::{OrderError, OrderRepository};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Begins a transaction spanning several repositories.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Returns a handle for the stores owned by dashboard users.
    pub fn stores(&self) -> StoreRepository {
        StoreRepository::new(self.pool.clone())
    }

    /// Returns a handle for store billboards.
    pub fn billboards(&self) -> BillboardRepository {
        BillboardRepository::new(self.pool.clone())
    }

    /// Returns a handle for store categories.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    /// Returns a handle for store products.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns a handle for orders and their line items.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Returns a handle for the processed payment event log.
    pub fn payment_events(&self) -> PaymentEventRepository {
        PaymentEventRepository
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_code(err, SQLITE_CONSTRAINT_FOREIGNKEY)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, SQLITE_CONSTRAINT_UNIQUE)
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use store_admin_core::{BillboardInput, CategoryInput, ProductInput, StoreInput};

    use super::Database;

    pub const USER_ID: &str = "user_1";

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    pub async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    /// Seeds one store with a billboard, a category and the given products.
    pub struct Catalog {
        pub store_id: String,
        pub billboard_id: String,
        pub category_id: String,
        pub product_ids: Vec<String>,
    }

    pub async fn seed_catalog(db: &Database, products: &[(&str, i64)]) -> Catalog {
        let store = db
            .stores()
            .create(
                USER_ID,
                &StoreInput {
                    name: "Shop".to_string(),
                },
                now(),
            )
            .await
            .expect("store");
        let billboard = db
            .billboards()
            .create(
                &store.id,
                &BillboardInput {
                    label: "Summer".to_string(),
                    image_url: "https://cdn.example/summer.png".to_string(),
                },
                now(),
            )
            .await
            .expect("billboard");
        let category = db
            .categories()
            .create(
                &store.id,
                &CategoryInput {
                    name: "Shirts".to_string(),
                    billboard_id: billboard.id.clone(),
                },
                now(),
            )
            .await
            .expect("category");

        let mut product_ids = Vec::new();
        for (name, price_cents) in products {
            let product = db
                .products()
                .create(
                    &store.id,
                    &ProductInput {
                        name: name.to_string(),
                        price_cents: *price_cents,
                        category_id: category.id.clone(),
                        is_featured: false,
                        is_archived: false,
                    },
                    now(),
                )
                .await
                .expect("product");
            product_ids.push(product.id);
        }

        Catalog {
            store_id: store.id,
            billboard_id: billboard.id,
            category_id: category.id,
            product_ids,
        }
    }
}

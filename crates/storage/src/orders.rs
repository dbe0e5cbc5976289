use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use store_admin_core::{format_usd, Order, OrderItem, OrderSummary};

use crate::{is_foreign_key_violation, new_id, to_rfc3339};

/// Errors that can occur while reading or mutating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,
    #[error("order references a product that does not exist")]
    UnknownProduct,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        if is_foreign_key_violation(&err) {
            Self::UnknownProduct
        } else {
            Self::Database(err)
        }
    }
}

/// Repository for orders and their line items.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = "id, store_id, is_paid, phone, address, created_at, updated_at";

impl OrderRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates an unpaid order with one line item per product id.
    pub async fn create_with_items(
        &self,
        store_id: &str,
        product_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, store_id, is_paid, phone, address, created_at, updated_at) \
             VALUES (?, ?, 0, '', '', ?, ?) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new_id())
        .bind(store_id)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .fetch_one(&mut *tx)
        .await?;

        for product_id in product_ids {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id) VALUES (?, ?, ?)")
                .bind(new_id())
                .bind(&order.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(order.into())
    }

    pub async fn fetch(&self, order_id: &str) -> Result<Order, OrderError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::from)
        .ok_or(OrderError::NotFound)
    }

    /// Lists the orders of a store, newest first, with product names and totals.
    pub async fn list_summaries(&self, store_id: &str) -> Result<Vec<OrderSummary>, OrderError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r#"
SELECT o.id,
       o.is_paid,
       o.phone,
       o.address,
       o.created_at,
       p.name AS product_name,
       p.price_cents AS product_price_cents
  FROM orders AS o
  LEFT JOIN order_items AS oi ON oi.order_id = o.id
  LEFT JOIN products AS p ON p.id = oi.product_id
 WHERE o.store_id = ?
 ORDER BY o.created_at DESC, o.id ASC, oi.id ASC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries: Vec<OrderSummary> = Vec::new();
        for row in rows {
            let same_order = summaries.last().is_some_and(|last| last.id == row.id);
            if !same_order {
                summaries.push(OrderSummary {
                    id: row.id.clone(),
                    is_paid: row.is_paid,
                    phone: row.phone.clone(),
                    address: row.address.clone(),
                    products: Vec::new(),
                    total_price_cents: 0,
                    total_price: String::new(),
                    created_at: row.created_at,
                });
            }
            if let Some(summary) = summaries.last_mut() {
                if let Some(name) = row.product_name {
                    summary.products.push(name);
                }
                summary.total_price_cents += row.product_price_cents.unwrap_or_default();
            }
        }
        for summary in &mut summaries {
            summary.total_price = format_usd(summary.total_price_cents);
        }

        Ok(summaries)
    }

    /// Marks an order paid and stores the shipping details, returning its line items.
    pub async fn mark_paid(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        address: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, OrderError> {
        let updated = sqlx::query(
            "UPDATE orders SET is_paid = 1, address = ?, phone = ?, updated_at = ? WHERE id = ?",
        )
        .bind(address)
        .bind(phone)
        .bind(to_rfc3339(now))
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(OrderError::NotFound);
        }

        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id FROM order_items WHERE order_id = ? ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(items.into_iter().map(OrderItem::from).collect())
    }

    /// Archives every listed product in one statement. Returns the number of rows touched.
    pub async fn archive_products(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, OrderError> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE products SET is_archived = 1, updated_at = ");
        builder.push_bind(to_rfc3339(now));
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in product_ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    store_id: String,
    is_paid: bool,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            is_paid: row.is_paid,
            phone: row.phone,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: String,
    is_paid: bool,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
    product_name: Option<String>,
    product_price_cents: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{now, seed_catalog, setup_db};
    use crate::ProductFilter;

    #[tokio::test]
    async fn mark_paid_returns_items_and_archive_hides_products() {
        let db = setup_db().await;
        let catalog = seed_catalog(&db, &[("Tee", 1500), ("Cap", 900)]).await;
        let repo = db.orders();
        let order = repo
            .create_with_items(&catalog.store_id, &catalog.product_ids, now())
            .await
            .expect("order");
        assert!(!order.is_paid);

        let mut tx = db.begin().await.expect("tx");
        let items = repo
            .mark_paid(&mut tx, &order.id, "1 Main St, US", "+1555", now())
            .await
            .expect("mark paid");
        assert_eq!(items.len(), 2);
        let ids: Vec<String> = items.into_iter().map(|item| item.product_id).collect();
        let archived = repo
            .archive_products(&mut tx, &ids, now())
            .await
            .expect("archive");
        assert_eq!(archived, 2);
        tx.commit().await.expect("commit");

        let paid = repo.fetch(&order.id).await.expect("fetch");
        assert!(paid.is_paid);
        assert_eq!(paid.address, "1 Main St, US");
        assert_eq!(paid.phone, "+1555");

        let visible = db
            .products()
            .list(&catalog.store_id, &ProductFilter::default())
            .await
            .expect("list");
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn mark_paid_reports_missing_order() {
        let db = setup_db().await;
        let mut tx = db.begin().await.expect("tx");
        let err = db
            .orders()
            .mark_paid(&mut tx, "missing", "", "", now())
            .await
            .expect_err("missing order");
        assert!(matches!(err, OrderError::NotFound));
    }

    #[tokio::test]
    async fn create_rejects_unknown_product() {
        let db = setup_db().await;
        let catalog = seed_catalog(&db, &[]).await;
        let err = db
            .orders()
            .create_with_items(&catalog.store_id, &["nope".to_string()], now())
            .await
            .expect_err("unknown product");
        assert!(matches!(err, OrderError::UnknownProduct));

        let summaries = db
            .orders()
            .list_summaries(&catalog.store_id)
            .await
            .expect("list");
        assert!(summaries.is_empty(), "failed order must be rolled back");
    }

    #[tokio::test]
    async fn summaries_group_items_and_total_prices() {
        let db = setup_db().await;
        let catalog = seed_catalog(&db, &[("Tee", 1500), ("Cap", 900)]).await;
        db.orders()
            .create_with_items(&catalog.store_id, &catalog.product_ids, now())
            .await
            .expect("order");
        db.orders()
            .create_with_items(&catalog.store_id, &[], now())
            .await
            .expect("empty order");

        let summaries = db
            .orders()
            .list_summaries(&catalog.store_id)
            .await
            .expect("list");
        assert_eq!(summaries.len(), 2);
        let full = summaries
            .iter()
            .find(|summary| summary.products.len() == 2)
            .expect("order with items");
        assert_eq!(full.total_price_cents, 2400);
        assert_eq!(full.total_price, "$24.00");
        let empty = summaries
            .iter()
            .find(|summary| summary.products.is_empty())
            .expect("empty order");
        assert_eq!(empty.total_price, "$0.00");
    }
}

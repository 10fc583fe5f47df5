//! Order composition and lookup.
//!
//! An order and its line items are created in one transaction; a missing
//! food or storage failure rolls the whole thing back, so no half-written
//! order is ever visible. The estimated-ready timestamp is creation time
//! plus the preparation time of the slowest referenced item, not the sum.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::{
    error::{AppError, map_foreign_key_violation},
    models::{Order, OrderItem},
    tags,
};

pub struct NewOrder {
    pub note: String,
    pub is_ranged: bool,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderLine>,
}

pub struct OrderLine {
    pub food_id: i64,
    pub quantity: i64,
}

pub struct OrderReceipt {
    pub order_id: i64,
    pub estimated_ready_at: DateTime<Utc>,
}

pub async fn create_order(
    pool: &SqlitePool,
    account_id: i64,
    new_order: &NewOrder,
) -> Result<OrderReceipt, AppError> {
    if new_order.items.is_empty() {
        return Err(AppError::Validation(
            "order must contain at least one item".into(),
        ));
    }
    for line in &new_order.items {
        if line.quantity <= 0 {
            return Err(AppError::Validation(
                "quantity must be a positive integer".into(),
            ));
        }
    }

    let created_at = Utc::now();
    let mut tx = pool.begin().await?;

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (account_id, note, is_ranged, delivery_address, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(account_id)
    .bind(&new_order.note)
    .bind(new_order.is_ranged)
    .bind(&new_order.delivery_address)
    .bind(created_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_foreign_key_violation(e, AppError::NotFound("account")))?;

    for line in &new_order.items {
        sqlx::query("INSERT INTO order_items (order_id, food_id, quantity) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(line.food_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_foreign_key_violation(e, AppError::NotFound("food")))?;
    }

    // Ready when the slowest item is ready.
    let max_prep_minutes: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(f.prep_minutes) FROM order_items oi
         JOIN foods f ON f.id = oi.food_id
         WHERE oi.order_id = ?",
    )
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    let max_prep_minutes =
        max_prep_minutes.ok_or(AppError::InvalidState("order has no items"))?;
    let estimated_ready_at = created_at + Duration::minutes(max_prep_minutes);

    sqlx::query("UPDATE orders SET estimated_ready_at = ? WHERE id = ?")
        .bind(estimated_ready_at)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    // Fire-and-report: the order is already committed, a failed tag
    // recompute must not unwind it.
    if let Err(e) = tags::recompute(pool, account_id).await {
        warn!("preference tag recompute failed for account {account_id}: {e}");
    }

    Ok(OrderReceipt {
        order_id,
        estimated_ready_at,
    })
}

pub async fn get_order(pool: &SqlitePool, order_id: i64) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("order"))
}

pub async fn orders_for_account(
    pool: &SqlitePool,
    account_id: i64,
) -> Result<Vec<Order>, AppError> {
    let orders =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE account_id = ? ORDER BY id")
            .bind(account_id)
            .fetch_all(pool)
            .await?;

    Ok(orders)
}

pub async fn order_items(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
    let items =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(pool)
            .await?;

    Ok(items)
}

/// Fulfillment queue: every order not yet marked done.
pub async fn list_undone(pool: &SqlitePool) -> Result<Vec<Order>, AppError> {
    let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE is_done = 0 ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(orders)
}

/// Total at current catalog prices.
pub async fn total_price(pool: &SqlitePool, order_id: i64) -> Result<i64, AppError> {
    get_order(pool, order_id).await?;

    let total: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(oi.quantity * f.price_cents) FROM order_items oi
         JOIN foods f ON f.id = oi.food_id
         WHERE oi.order_id = ?",
    )
    .bind(order_id)
    .fetch_one(pool)
    .await?;

    Ok(total.unwrap_or(0))
}

/// Marks a paid order done. An unpaid order is not fulfillable.
pub async fn finish_order(pool: &SqlitePool, order_id: i64) -> Result<(), AppError> {
    let order = get_order(pool, order_id).await?;

    if !order.is_paid {
        return Err(AppError::InvalidState("order is not paid"));
    }

    sqlx::query("UPDATE orders SET is_done = 1 WHERE id = ?")
        .bind(order_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Administrative removal; line items go with the order via the cascade.
pub async fn delete_order(pool: &SqlitePool, order_id: i64) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(order_id)
        .execute(pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("order"));
    }

    Ok(())
}

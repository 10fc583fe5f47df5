use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{FoodRatingSummary, Order},
    orders,
};

fn validate_rating(rating: i64) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".into(),
        ));
    }

    Ok(())
}

async fn owned_order(
    pool: &SqlitePool,
    account_id: i64,
    order_id: i64,
) -> Result<Order, AppError> {
    let order = orders::get_order(pool, order_id).await?;

    if order.account_id != account_id {
        return Err(AppError::Unauthorized);
    }

    Ok(order)
}

/// Attaches a rating and/or free-text feedback to an order. The two fields
/// are independent: an omitted one leaves the stored value untouched.
pub async fn rate_order(
    pool: &SqlitePool,
    account_id: i64,
    order_id: i64,
    rating: Option<i64>,
    feedback: Option<String>,
) -> Result<(), AppError> {
    if rating.is_none() && feedback.is_none() {
        return Err(AppError::Validation(
            "provide a rating or feedback".into(),
        ));
    }
    if let Some(rating) = rating {
        validate_rating(rating)?;
    }

    owned_order(pool, account_id, order_id).await?;

    sqlx::query(
        "UPDATE orders
         SET rating = COALESCE(?1, rating), feedback = COALESCE(?2, feedback)
         WHERE id = ?3",
    )
    .bind(rating)
    .bind(feedback)
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn rate_line_item(
    pool: &SqlitePool,
    account_id: i64,
    order_id: i64,
    food_id: i64,
    rating: i64,
) -> Result<(), AppError> {
    validate_rating(rating)?;
    owned_order(pool, account_id, order_id).await?;

    let updated = sqlx::query("UPDATE order_items SET rating = ? WHERE order_id = ? AND food_id = ?")
        .bind(rating)
        .bind(order_id)
        .bind(food_id)
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("order item"));
    }

    Ok(())
}

/// Mean of all non-null line-item ratings for a food, plus how many line
/// items reference it. Both counts span every order regardless of payment
/// or fulfillment state.
pub async fn food_rating_summary(
    pool: &SqlitePool,
    food_id: i64,
) -> Result<FoodRatingSummary, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM foods WHERE id = ?")
        .bind(food_id)
        .fetch_optional(pool)
        .await?;
    exists.ok_or(AppError::NotFound("food"))?;

    let average_rating: Option<f64> =
        sqlx::query_scalar("SELECT AVG(rating) FROM order_items WHERE food_id = ?")
            .bind(food_id)
            .fetch_one(pool)
            .await?;

    let times_ordered: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE food_id = ?")
            .bind(food_id)
            .fetch_one(pool)
            .await?;

    Ok(FoodRatingSummary {
        average_rating,
        times_ordered,
    })
}

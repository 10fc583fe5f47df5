//! Preference tags derived from order history.
//!
//! An account's preferred categories are the three tags its line items
//! reference most often. Ranking counts line items (one per line, not
//! weighted by quantity), descending, with ties broken lexicographically by
//! tag so recomputation is deterministic for a given history. The result is
//! stored as an ordered set of rows, never a joined string.

use sqlx::SqlitePool;

use crate::{error::AppError, models::Food};

const TOP_TAGS: i64 = 3;

pub async fn recompute(pool: &SqlitePool, account_id: i64) -> Result<Vec<String>, AppError> {
    let tags: Vec<String> = sqlx::query_scalar(
        "SELECT ft.tag FROM order_items oi
         JOIN orders o ON o.id = oi.order_id
         JOIN food_tags ft ON ft.food_id = oi.food_id
         WHERE o.account_id = ?
         GROUP BY ft.tag
         ORDER BY COUNT(*) DESC, ft.tag ASC
         LIMIT ?",
    )
    .bind(account_id)
    .bind(TOP_TAGS)
    .fetch_all(pool)
    .await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM account_tags WHERE account_id = ?")
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

    for (position, tag) in tags.iter().enumerate() {
        sqlx::query("INSERT INTO account_tags (account_id, position, tag) VALUES (?, ?, ?)")
            .bind(account_id)
            .bind(position as i64)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(tags)
}

pub async fn preferred_tags(pool: &SqlitePool, account_id: i64) -> Result<Vec<String>, AppError> {
    let tags = sqlx::query_scalar(
        "SELECT tag FROM account_tags WHERE account_id = ? ORDER BY position",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(tags)
}

/// Foods carrying any of the account's preferred tags.
pub async fn recommendations(pool: &SqlitePool, account_id: i64) -> Result<Vec<Food>, AppError> {
    let foods = sqlx::query_as::<_, Food>(
        "SELECT DISTINCT f.* FROM foods f
         JOIN food_tags ft ON ft.food_id = f.id
         JOIN account_tags at ON at.tag = ft.tag
         WHERE at.account_id = ?
         ORDER BY f.name",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(foods)
}

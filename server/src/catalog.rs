use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::{
    error::{AppError, map_foreign_key_violation, map_unique_violation},
    models::{Food, FoodWithTags},
};

pub struct NewFood {
    pub name: String,
    pub tags: Vec<String>,
    pub price_cents: i64,
    pub prep_minutes: i64,
    pub info: Option<String>,
    pub ingredients: String,
    pub is_rangeable: bool,
}

fn validate(food: &NewFood) -> Result<(), AppError> {
    if food.name.trim().is_empty() {
        return Err(AppError::Validation("food name must not be empty".into()));
    }
    if food.price_cents <= 0 {
        return Err(AppError::Validation("price must be positive".into()));
    }
    if food.prep_minutes < 0 {
        return Err(AppError::Validation(
            "preparation time must not be negative".into(),
        ));
    }
    if food.tags.is_empty() {
        return Err(AppError::Validation(
            "food needs at least one category tag".into(),
        ));
    }

    Ok(())
}

pub async fn create_food(pool: &SqlitePool, food: &NewFood) -> Result<i64, AppError> {
    validate(food)?;

    let mut tx = pool.begin().await?;

    let food_id: i64 = sqlx::query_scalar(
        "INSERT INTO foods (name, price_cents, prep_minutes, info, ingredients, is_rangeable)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&food.name)
    .bind(food.price_cents)
    .bind(food.prep_minutes)
    .bind(&food.info)
    .bind(&food.ingredients)
    .bind(food.is_rangeable)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "food name already exists"))?;

    for tag in &food.tags {
        sqlx::query("INSERT OR IGNORE INTO food_tags (food_id, tag) VALUES (?, ?)")
            .bind(food_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(food_id)
}

/// Full update of a food's mutable attributes, keyed by name as the
/// mutation endpoints are. Tags are replaced wholesale.
pub async fn alter_food(pool: &SqlitePool, food: &NewFood) -> Result<(), AppError> {
    validate(food)?;

    let mut tx = pool.begin().await?;

    let food_id: Option<i64> = sqlx::query_scalar(
        "UPDATE foods
         SET price_cents = ?, prep_minutes = ?, info = ?, ingredients = ?, is_rangeable = ?
         WHERE name = ?
         RETURNING id",
    )
    .bind(food.price_cents)
    .bind(food.prep_minutes)
    .bind(&food.info)
    .bind(&food.ingredients)
    .bind(food.is_rangeable)
    .bind(&food.name)
    .fetch_optional(&mut *tx)
    .await?;

    let food_id = food_id.ok_or(AppError::NotFound("food"))?;

    sqlx::query("DELETE FROM food_tags WHERE food_id = ?")
        .bind(food_id)
        .execute(&mut *tx)
        .await?;

    for tag in &food.tags {
        sqlx::query("INSERT OR IGNORE INTO food_tags (food_id, tag) VALUES (?, ?)")
            .bind(food_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(())
}

pub async fn delete_food(pool: &SqlitePool, name: &str) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM foods WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| {
            map_foreign_key_violation(
                e,
                AppError::InvalidState("food is referenced by existing orders"),
            )
        })?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("food"));
    }

    Ok(())
}

pub async fn get_food(pool: &SqlitePool, food_id: i64) -> Result<FoodWithTags, AppError> {
    let food = sqlx::query_as::<_, Food>("SELECT * FROM foods WHERE id = ?")
        .bind(food_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("food"))?;

    let tags = sqlx::query_scalar("SELECT tag FROM food_tags WHERE food_id = ? ORDER BY tag")
        .bind(food_id)
        .fetch_all(pool)
        .await?;

    Ok(FoodWithTags { food, tags })
}

pub async fn list_menu(pool: &SqlitePool) -> Result<Vec<FoodWithTags>, AppError> {
    let foods = sqlx::query_as::<_, Food>("SELECT * FROM foods ORDER BY name")
        .fetch_all(pool)
        .await?;

    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT food_id, tag FROM food_tags ORDER BY tag")
            .fetch_all(pool)
            .await?;

    let mut tags_by_food: HashMap<i64, Vec<String>> = HashMap::new();
    for (food_id, tag) in rows {
        tags_by_food.entry(food_id).or_default().push(tag);
    }

    Ok(foods
        .into_iter()
        .map(|food| {
            let tags = tags_by_food.remove(&food.id).unwrap_or_default();
            FoodWithTags { food, tags }
        })
        .collect())
}

pub async fn foods_by_tag(pool: &SqlitePool, tag: &str) -> Result<Vec<Food>, AppError> {
    let foods = sqlx::query_as::<_, Food>(
        "SELECT f.* FROM foods f
         JOIN food_tags t ON t.food_id = f.id
         WHERE t.tag = ?
         ORDER BY f.name",
    )
    .bind(tag)
    .fetch_all(pool)
    .await?;

    Ok(foods)
}

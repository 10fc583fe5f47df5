use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::database::init_schema;

pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    // A single connection keeps every test task on the same in-memory
    // database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    init_schema(&pool).await.unwrap();

    pool
}

pub async fn seed_account(pool: &SqlitePool, username: &str, balance_cents: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO accounts (username, password_hash, email, address, phone, balance_cents)
         VALUES (?, 'not-a-hash', ?, '101 Main St', '5550100', ?)
         RETURNING id",
    )
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(balance_cents)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_admin(pool: &SqlitePool, username: &str) -> i64 {
    let id = seed_account(pool, username, 0).await;

    sqlx::query("UPDATE accounts SET is_admin = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    id
}

pub async fn seed_food(
    pool: &SqlitePool,
    name: &str,
    price_cents: i64,
    prep_minutes: i64,
    tags: &[&str],
) -> i64 {
    let food_id: i64 = sqlx::query_scalar(
        "INSERT INTO foods (name, price_cents, prep_minutes, ingredients)
         VALUES (?, ?, ?, '')
         RETURNING id",
    )
    .bind(name)
    .bind(price_cents)
    .bind(prep_minutes)
    .fetch_one(pool)
    .await
    .unwrap();

    for tag in tags {
        sqlx::query("INSERT INTO food_tags (food_id, tag) VALUES (?, ?)")
            .bind(food_id)
            .bind(tag)
            .execute(pool)
            .await
            .unwrap();
    }

    food_id
}

pub async fn balance_of(pool: &SqlitePool, account_id: i64) -> i64 {
    sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

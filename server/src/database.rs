//! SQLite-backed store.
//!
//! One pool for the whole process. Every balance mutation is either a single
//! conditional statement or runs inside a transaction, so correctness never
//! depends on in-process locking: requests may be served by any connection
//! (or, in a larger deployment, any process) and the store serializes them.
//!
//! The `balance_cents >= 0` CHECK is a backstop. The real guard is the
//! conditional UPDATE in [`crate::ledger`].

use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::error::AppError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        email TEXT NOT NULL,
        address TEXT NOT NULL,
        phone TEXT NOT NULL,
        balance_cents INTEGER NOT NULL DEFAULT 0 CHECK (balance_cents >= 0),
        is_admin INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS foods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        price_cents INTEGER NOT NULL CHECK (price_cents > 0),
        prep_minutes INTEGER NOT NULL DEFAULT 0,
        info TEXT,
        ingredients TEXT NOT NULL DEFAULT '',
        is_rangeable INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS food_tags (
        food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
        tag TEXT NOT NULL,
        PRIMARY KEY (food_id, tag)
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        note TEXT NOT NULL DEFAULT '',
        is_ranged INTEGER NOT NULL DEFAULT 0,
        delivery_address TEXT,
        is_paid INTEGER NOT NULL DEFAULT 0,
        is_done INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        estimated_ready_at TEXT,
        rating INTEGER,
        feedback TEXT
    )",
    "CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        food_id INTEGER NOT NULL REFERENCES foods(id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        rating INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS account_tags (
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        tag TEXT NOT NULL,
        PRIMARY KEY (account_id, position)
    )",
    "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_food ON order_items(food_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_account ON orders(account_id)",
];

pub async fn init_pool(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

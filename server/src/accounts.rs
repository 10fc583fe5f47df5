use chrono::Duration;
use sqlx::SqlitePool;

use crate::{
    auth::{self, AuthUser},
    error::{AppError, map_unique_violation},
    models::Account,
};

pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

pub async fn register(pool: &SqlitePool, registration: &Registration) -> Result<i64, AppError> {
    if registration.username.trim().is_empty() {
        return Err(AppError::Validation("username must not be empty".into()));
    }
    if registration.password.is_empty() {
        return Err(AppError::Validation("password must not be empty".into()));
    }

    let password_hash = auth::hash_password(&registration.password)?;

    // The unique constraint on username is the duplicate check; probing
    // first would race with concurrent registrations.
    sqlx::query_scalar(
        "INSERT INTO accounts (username, password_hash, email, address, phone)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&registration.username)
    .bind(&password_hash)
    .bind(&registration.email)
    .bind(&registration.address)
    .bind(&registration.phone)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, "username already exists"))
}

/// Checks the password and issues a token. The requested lifetime is clamped
/// to at most one hour.
pub async fn login(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    requested_lifetime_secs: i64,
    auth_key: &str,
) -> Result<(String, Account), AppError> {
    let account = get_by_username(pool, username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    auth::check_password(password, &account.password_hash)?;

    let lifetime = auth::clamp_lifetime(requested_lifetime_secs);
    let token = auth::make_jwt(
        account.id,
        &account.username,
        Duration::seconds(lifetime),
        auth_key,
    )?;

    Ok((token, account))
}

pub async fn get_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(account)
}

/// Re-checks a token's `(username, id)` pair against the live account record.
pub async fn verified(pool: &SqlitePool, auth: &AuthUser) -> Result<Account, AppError> {
    let account = get_by_username(pool, &auth.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if account.id != auth.account_id {
        return Err(AppError::Unauthorized);
    }

    Ok(account)
}

pub async fn require_admin(pool: &SqlitePool, auth: &AuthUser) -> Result<Account, AppError> {
    let account = verified(pool, auth).await?;

    if !account.is_admin {
        return Err(AppError::Unauthorized);
    }

    Ok(account)
}

pub async fn alter(
    pool: &SqlitePool,
    account_id: i64,
    email: &str,
    address: &str,
    phone: &str,
) -> Result<(), AppError> {
    let updated = sqlx::query("UPDATE accounts SET email = ?, address = ?, phone = ? WHERE id = ?")
        .bind(email)
        .bind(address)
        .bind(phone)
        .bind(account_id)
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("account"));
    }

    Ok(())
}

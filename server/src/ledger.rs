//! Account balance guard.
//!
//! Both operations are single conditional statements, so the read-modify-write
//! is atomic in the store no matter how many requests race on the same
//! account. A prior SELECT followed by an unconditional UPDATE would let two
//! concurrent debits observe the same starting balance and double-spend.
//!
//! Callers that need a debit to be part of a larger atomic step (payment
//! settlement) pass their open transaction as the connection.

use sqlx::SqliteConnection;

use crate::error::AppError;

pub async fn credit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount_cents: i64,
) -> Result<i64, AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("amount must be positive".into()));
    }

    sqlx::query_scalar(
        "UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?
         RETURNING balance_cents",
    )
    .bind(amount_cents)
    .bind(account_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("account"))
}

pub async fn debit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount_cents: i64,
) -> Result<i64, AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("amount must be positive".into()));
    }

    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE accounts SET balance_cents = balance_cents - ?1
         WHERE id = ?2 AND balance_cents >= ?1
         RETURNING balance_cents",
    )
    .bind(amount_cents)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => Ok(balance),
        None => {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(conn)
                .await?;

            match exists {
                Some(_) => Err(AppError::InsufficientFunds),
                None => Err(AppError::NotFound("account")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{balance_of, seed_account, test_pool};

    #[tokio::test]
    async fn credit_and_debit_move_the_balance() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "alice", 0).await;
        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(credit(&mut conn, account, 1000).await.unwrap(), 1000);
        assert_eq!(debit(&mut conn, account, 400).await.unwrap(), 600);
        drop(conn);
        assert_eq!(balance_of(&pool, account).await, 600);
    }

    #[tokio::test]
    async fn debit_rejects_insufficient_balance() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "bob", 300).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(matches!(
            debit(&mut conn, account, 800).await,
            Err(AppError::InsufficientFunds)
        ));
        drop(conn);
        assert_eq!(balance_of(&pool, account).await, 300);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "carol", 100).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(matches!(
            credit(&mut conn, account, 0).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            debit(&mut conn, account, -5).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(matches!(
            credit(&mut conn, 999, 100).await,
            Err(AppError::NotFound("account"))
        ));
        assert!(matches!(
            debit(&mut conn, 999, 100).await,
            Err(AppError::NotFound("account"))
        ));
    }

    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "dave", 1000).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                debit(&mut conn, account, 300).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        // 1000 / 300: exactly three debits fit.
        assert_eq!(successes, 3);
        assert_eq!(balance_of(&pool, account).await, 100);
    }
}

//! Payment settlement.
//!
//! A settlement is one transaction: load + ownership and paid-flag checks,
//! total at current prices, ledger debit, paid mark. Either all of it
//! commits or none of it does, so a debit without a paid order (or the
//! reverse) is never observable and two concurrent settlements of the same
//! order cannot both succeed.

use sqlx::SqlitePool;
use tracing::info;

use crate::{error::AppError, ledger, models::Order};

pub struct Settlement {
    pub order_id: i64,
    pub total_cents: i64,
    pub balance_cents: i64,
}

pub async fn settle(
    pool: &SqlitePool,
    account_id: i64,
    order_id: i64,
) -> Result<Settlement, AppError> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("order"))?;

    if order.account_id != account_id {
        return Err(AppError::Unauthorized);
    }
    if order.is_paid {
        return Err(AppError::AlreadyPaid);
    }

    // Prices are read at settlement time, not frozen at order time.
    let total_cents: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(oi.quantity * f.price_cents) FROM order_items oi
         JOIN foods f ON f.id = oi.food_id
         WHERE oi.order_id = ?",
    )
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    let total_cents = total_cents.ok_or(AppError::InvalidState("order has no items"))?;

    let balance_cents = ledger::debit(&mut tx, account_id, total_cents).await?;

    let marked = sqlx::query("UPDATE orders SET is_paid = 1 WHERE id = ? AND is_paid = 0")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    if marked.rows_affected() == 0 {
        // Dropping the transaction rolls the debit back.
        return Err(AppError::AlreadyPaid);
    }

    tx.commit().await?;

    info!("Order {order_id} settled for {total_cents} cents");

    Ok(Settlement {
        order_id,
        total_cents,
        balance_cents,
    })
}

pub async fn recharge(
    pool: &SqlitePool,
    account_id: i64,
    amount_cents: i64,
) -> Result<i64, AppError> {
    let mut conn = pool.acquire().await?;

    ledger::credit(&mut conn, account_id, amount_cents).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        orders::{NewOrder, OrderLine, create_order, get_order},
        testutil::{balance_of, seed_account, seed_food, test_pool},
    };

    async fn order_with(pool: &SqlitePool, account: i64, food: i64, quantity: i64) -> i64 {
        create_order(
            pool,
            account,
            &NewOrder {
                note: String::new(),
                is_ranged: false,
                delivery_address: None,
                items: vec![OrderLine { food_id: food, quantity }],
            },
        )
        .await
        .unwrap()
        .order_id
    }

    #[tokio::test]
    async fn settles_and_debits_exactly_once() {
        let pool = test_pool().await;
        // Balance 10.00, two items at 4.00 each.
        let account = seed_account(&pool, "alice", 1000).await;
        let food = seed_food(&pool, "noodles", 400, 10, &["noodles"]).await;
        let order_id = order_with(&pool, account, food, 2).await;

        let settlement = settle(&pool, account, order_id).await.unwrap();
        assert_eq!(settlement.total_cents, 800);
        assert_eq!(settlement.balance_cents, 200);
        assert!(get_order(&pool, order_id).await.unwrap().is_paid);

        // Retry is idempotent: AlreadyPaid, balance untouched.
        assert!(matches!(
            settle(&pool, account, order_id).await,
            Err(AppError::AlreadyPaid)
        ));
        assert_eq!(balance_of(&pool, account).await, 200);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_everything_unchanged() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "bob", 300).await;
        let food = seed_food(&pool, "steak", 400, 20, &["meat"]).await;
        let order_id = order_with(&pool, account, food, 2).await;

        assert!(matches!(
            settle(&pool, account, order_id).await,
            Err(AppError::InsufficientFunds)
        ));
        assert_eq!(balance_of(&pool, account).await, 300);
        assert!(!get_order(&pool, order_id).await.unwrap().is_paid);
    }

    #[tokio::test]
    async fn only_the_owner_may_settle() {
        let pool = test_pool().await;
        let owner = seed_account(&pool, "carol", 1000).await;
        let other = seed_account(&pool, "mallory", 1000).await;
        let food = seed_food(&pool, "tacos", 300, 10, &["mexican"]).await;
        let order_id = order_with(&pool, owner, food, 1).await;

        assert!(matches!(
            settle(&pool, other, order_id).await,
            Err(AppError::Unauthorized)
        ));
        assert_eq!(balance_of(&pool, other).await, 1000);

        assert!(matches!(
            settle(&pool, owner, 999).await,
            Err(AppError::NotFound("order"))
        ));
    }

    #[tokio::test]
    async fn concurrent_settlements_pay_once() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "dave", 5000).await;
        let food = seed_food(&pool, "burger", 700, 15, &["burger"]).await;
        let order_id = order_with(&pool, account, food, 1).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                settle(&pool, account, order_id).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(balance_of(&pool, account).await, 4300);
    }

    #[tokio::test]
    async fn mixed_settles_and_recharges_never_overdraw() {
        let pool = test_pool().await;
        // 5.00 on hand, three orders of 4.00 each, two 3.00 recharges racing
        // them. At most two settlements can ever fit the total funds.
        let account = seed_account(&pool, "frank", 500).await;
        let food = seed_food(&pool, "dumplings", 400, 10, &["dumplings"]).await;

        let mut order_ids = Vec::new();
        for _ in 0..3 {
            order_ids.push(order_with(&pool, account, food, 1).await);
        }

        let mut settles = Vec::new();
        for order_id in order_ids {
            let pool = pool.clone();
            settles.push(tokio::spawn(async move {
                settle(&pool, account, order_id).await.is_ok()
            }));
        }
        let mut recharges = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            recharges.push(tokio::spawn(async move {
                recharge(&pool, account, 300).await.unwrap()
            }));
        }

        let mut settled: i64 = 0;
        for handle in settles {
            if handle.await.unwrap() {
                settled += 1;
            }
        }
        for handle in recharges {
            handle.await.unwrap();
        }

        assert!((1..=2).contains(&settled));
        let balance = balance_of(&pool, account).await;
        assert_eq!(balance, 500 + 600 - 400 * settled);
        assert!(balance >= 0);
    }

    #[tokio::test]
    async fn recharge_validates_and_returns_new_balance() {
        let pool = test_pool().await;
        let account = seed_account(&pool, "erin", 100).await;

        assert_eq!(recharge(&pool, account, 900).await.unwrap(), 1000);
        assert!(matches!(
            recharge(&pool, account, 0).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            recharge(&pool, 999, 100).await,
            Err(AppError::NotFound("account"))
        ));
    }
}

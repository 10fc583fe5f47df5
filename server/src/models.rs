use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Account row. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub balance_cents: i64,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub prep_minutes: i64,
    pub info: Option<String>,
    pub ingredients: String,
    pub is_rangeable: bool,
}

/// Food plus its category tags, which live in their own table.
#[derive(Debug, Clone, Serialize)]
pub struct FoodWithTags {
    #[serde(flatten)]
    pub food: Food,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub note: String,
    pub is_ranged: bool,
    pub delivery_address: Option<String>,
    pub is_paid: bool,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub estimated_ready_at: Option<DateTime<Utc>>,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub food_id: i64,
    pub quantity: i64,
    pub rating: Option<i64>,
}

/// `average_rating` is None until at least one line item has been rated.
#[derive(Debug, Clone, Serialize)]
pub struct FoodRatingSummary {
    pub average_rating: Option<f64>,
    pub times_ordered: i64,
}

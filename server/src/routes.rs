use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    accounts::{self, Registration},
    auth::AuthUser,
    catalog::{self, NewFood},
    error::AppError,
    feedback,
    models::Order,
    orders::{self, NewOrder, OrderLine},
    payment,
    state::AppState,
    tags,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register_handler))
        .route("/users/login", post(login_handler))
        .route("/users/change-info", put(alter_account_handler))
        .route("/users", get(current_account_handler))
        .route("/payment", put(payment_handler))
        .route("/recharge", put(recharge_handler))
        .route("/foods", post(create_food_handler))
        .route("/foods/change-info", put(alter_food_handler))
        .route("/foods", delete(delete_food_handler))
        .route("/foods", get(get_food_handler))
        .route("/orders", post(create_order_handler))
        .route("/orders", delete(delete_order_handler))
        .route("/orders/user", get(my_orders_handler))
        .route("/orders/by-id", get(order_by_id_handler))
        .route("/orders/items", get(order_items_handler))
        .route("/orders/total-price", get(total_price_handler))
        .route("/orders/undone", get(undone_orders_handler))
        .route("/orders/rate", put(rate_item_handler))
        .route("/orders/rate-order", put(rate_order_handler))
        .route("/orders/feedback", put(feedback_handler))
        .route("/orders/finish", put(finish_order_handler))
        .route("/menu", get(menu_handler))
        .route("/menu/rating-times-info", get(rating_info_handler))
        .route("/menu/sort-type", get(foods_by_tag_handler))
        .route("/menu/sort-by-usertag", get(recommendations_handler))
}

/// Loads an order the requester is allowed to see: its owner, or the admin.
async fn visible_order(
    state: &AppState,
    auth: &AuthUser,
    order_id: i64,
) -> Result<Order, AppError> {
    let account = accounts::verified(&state.pool, auth).await?;
    let order = orders::get_order(&state.pool, order_id).await?;

    if order.account_id != account.id && !account.is_admin {
        return Err(AppError::Unauthorized);
    }

    Ok(order)
}

#[derive(Deserialize)]
struct OrderIdQuery {
    order_id: i64,
}

#[derive(Deserialize)]
struct FoodIdQuery {
    food_id: i64,
}

#[derive(Deserialize)]
struct TagQuery {
    tag: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    email: String,
    address: String,
    phone: String,
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Register request received");

    accounts::register(
        &state.pool,
        &Registration {
            username: payload.username,
            password: payload.password,
            email: payload.email,
            address: payload.address,
            phone: payload.phone,
        },
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Registration successful" }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
    #[serde(default)]
    expires_in_seconds: i64,
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Login request received");

    let (token, account) = accounts::login(
        &state.pool,
        &payload.username,
        &payload.password,
        payload.expires_in_seconds,
        &state.config.auth_key,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "id": account.id,
        "username": account.username,
    })))
}

#[derive(Deserialize)]
struct AlterAccountRequest {
    email: String,
    address: String,
    phone: String,
}

async fn alter_account_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<AlterAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Alter account request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    accounts::alter(
        &state.pool,
        account.id,
        &payload.email,
        &payload.address,
        &payload.phone,
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Account updated successfully" }),
    ))
}

async fn current_account_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = accounts::verified(&state.pool, &auth).await?;
    let preferred_tags = tags::preferred_tags(&state.pool, account.id).await?;

    Ok(Json(json!({
        "success": true,
        "account": account,
        "preferred_tags": preferred_tags,
        "message": "Account retrieved successfully",
    })))
}

#[derive(Deserialize)]
struct PaymentRequest {
    order_id: i64,
}

async fn payment_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<PaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Payment request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    let settlement = payment::settle(&state.pool, account.id, payload.order_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment successful",
        "total_cents": settlement.total_cents,
        "balance_cents": settlement.balance_cents,
    })))
}

#[derive(Deserialize)]
struct RechargeRequest {
    amount_cents: i64,
}

async fn recharge_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<RechargeRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Recharge request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    let balance_cents = payment::recharge(&state.pool, account.id, payload.amount_cents).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Recharge successful",
        "balance_cents": balance_cents,
    })))
}

#[derive(Deserialize)]
struct FoodRequest {
    food_name: String,
    food_tags: Vec<String>,
    price_cents: i64,
    prep_minutes: i64,
    info: Option<String>,
    #[serde(default)]
    ingredients: String,
    #[serde(default)]
    is_rangeable: bool,
}

impl From<FoodRequest> for NewFood {
    fn from(payload: FoodRequest) -> Self {
        Self {
            name: payload.food_name,
            tags: payload.food_tags,
            price_cents: payload.price_cents,
            prep_minutes: payload.prep_minutes,
            info: payload.info,
            ingredients: payload.ingredients,
            is_rangeable: payload.is_rangeable,
        }
    }
}

async fn create_food_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<FoodRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Create food request received from {}", auth.username);

    accounts::require_admin(&state.pool, &auth).await?;
    catalog::create_food(&state.pool, &payload.into()).await?;

    Ok(Json(
        json!({ "success": true, "message": "Food item created successfully" }),
    ))
}

async fn alter_food_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<FoodRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Alter food request received from {}", auth.username);

    accounts::require_admin(&state.pool, &auth).await?;
    catalog::alter_food(&state.pool, &payload.into()).await?;

    Ok(Json(
        json!({ "success": true, "message": "Food item updated successfully" }),
    ))
}

#[derive(Deserialize)]
struct DeleteFoodRequest {
    food_name: String,
}

async fn delete_food_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteFoodRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Delete food request received from {}", auth.username);

    accounts::require_admin(&state.pool, &auth).await?;
    catalog::delete_food(&state.pool, &payload.food_name).await?;

    Ok(Json(
        json!({ "success": true, "message": "Food item deleted successfully" }),
    ))
}

async fn get_food_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FoodIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let food = catalog::get_food(&state.pool, query.food_id).await?;

    Ok(Json(food))
}

#[derive(Deserialize)]
struct CreateOrderRequest {
    #[serde(default)]
    order_info: String,
    #[serde(default)]
    is_ranged: bool,
    delivery_address: Option<String>,
    order_items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
struct OrderItemRequest {
    food_id: i64,
    quantity: i64,
}

async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Create order request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;

    let receipt = orders::create_order(
        &state.pool,
        account.id,
        &NewOrder {
            note: payload.order_info,
            is_ranged: payload.is_ranged,
            delivery_address: payload.delivery_address,
            items: payload
                .order_items
                .iter()
                .map(|item| OrderLine {
                    food_id: item.food_id,
                    quantity: item.quantity,
                })
                .collect(),
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order created successfully",
        "order_id": receipt.order_id,
        "estimated_ready_at": receipt.estimated_ready_at,
    })))
}

#[derive(Deserialize)]
struct DeleteOrderRequest {
    order_id: i64,
}

async fn delete_order_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Delete order request received from {}", auth.username);

    accounts::require_admin(&state.pool, &auth).await?;
    orders::delete_order(&state.pool, payload.order_id).await?;

    Ok(Json(
        json!({ "success": true, "message": "Order deleted successfully" }),
    ))
}

async fn my_orders_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = accounts::verified(&state.pool, &auth).await?;
    let orders = orders::orders_for_account(&state.pool, account.id).await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders,
        "message": "Orders retrieved successfully",
    })))
}

async fn order_by_id_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = visible_order(&state, &auth, query.order_id).await?;

    Ok(Json(json!({
        "success": true,
        "order": order,
        "message": "Order retrieved successfully",
    })))
}

async fn order_items_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    visible_order(&state, &auth, query.order_id).await?;
    let items = orders::order_items(&state.pool, query.order_id).await?;

    Ok(Json(json!({
        "success": true,
        "items": items,
        "message": "Ordered items retrieved successfully",
    })))
}

async fn total_price_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    visible_order(&state, &auth, query.order_id).await?;
    let total_cents = orders::total_price(&state.pool, query.order_id).await?;

    Ok(Json(json!({
        "success": true,
        "total_cents": total_cents,
        "message": "Order total price retrieved successfully",
    })))
}

async fn undone_orders_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    accounts::verified(&state.pool, &auth).await?;
    let orders = orders::list_undone(&state.pool).await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders,
        "message": "Undone orders retrieved successfully",
    })))
}

#[derive(Deserialize)]
struct RateItemRequest {
    order_id: i64,
    food_id: i64,
    rating: i64,
}

async fn rate_item_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<RateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Rate ordered items request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    feedback::rate_line_item(
        &state.pool,
        account.id,
        payload.order_id,
        payload.food_id,
        payload.rating,
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Items rated successfully" }),
    ))
}

#[derive(Deserialize)]
struct RateOrderRequest {
    order_id: i64,
    rating: Option<i64>,
    feedback: Option<String>,
}

async fn rate_order_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<RateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Rate order request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    feedback::rate_order(
        &state.pool,
        account.id,
        payload.order_id,
        payload.rating,
        payload.feedback,
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Order rated successfully" }),
    ))
}

#[derive(Deserialize)]
struct FeedbackRequest {
    order_id: i64,
    feedback: String,
}

async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Update feedback request received from {}", auth.username);

    let account = accounts::verified(&state.pool, &auth).await?;
    feedback::rate_order(
        &state.pool,
        account.id,
        payload.order_id,
        None,
        Some(payload.feedback),
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Feedback updated successfully" }),
    ))
}

#[derive(Deserialize)]
struct FinishOrderRequest {
    order_id: i64,
}

async fn finish_order_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<FinishOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Finish order request received from {}", auth.username);

    visible_order(&state, &auth, payload.order_id).await?;
    orders::finish_order(&state.pool, payload.order_id).await?;

    Ok(Json(
        json!({ "success": true, "message": "Order finished successfully" }),
    ))
}

async fn menu_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let foods = catalog::list_menu(&state.pool).await?;

    Ok(Json(json!({
        "success": true,
        "foods": foods,
        "message": "Food list retrieved successfully",
    })))
}

async fn rating_info_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FoodIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let summary = feedback::food_rating_summary(&state.pool, query.food_id).await?;

    Ok(Json(json!({
        "success": true,
        "average_rating": summary.average_rating,
        "times_ordered": summary.times_ordered,
        "message": "Food rating retrieved successfully",
    })))
}

async fn foods_by_tag_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TagQuery>,
) -> Result<impl IntoResponse, AppError> {
    let foods = catalog::foods_by_tag(&state.pool, &query.tag).await?;

    Ok(Json(json!({
        "success": true,
        "foods": foods,
        "message": "Food list retrieved successfully",
    })))
}

async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = accounts::verified(&state.pool, &auth).await?;
    let foods = tags::recommendations(&state.pool, account.id).await?;

    if foods.is_empty() {
        return Err(AppError::NotFound("user tags"));
    }

    Ok(Json(json!({
        "success": true,
        "foods": foods,
        "message": "Food list retrieved successfully",
    })))
}

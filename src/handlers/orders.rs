use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::{AuthUser, OptionalAuthUser},
    cart::Cart,
    errors::ApiError,
    services::CreateOrderInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use tower_sessions::Session;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/", post(create_order))
        .route("/{id}", get(get_order))
        .route("/{id}/mark-paid", post(mark_paid))
}

/// List the caller's orders (staff see all orders)
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders newest first", body = [crate::services::OrderResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_for_user(&user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Retrieve one order (owner or staff)
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and total", body = crate::services::OrderResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_for_user(id, &user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Place an order from the session cart. Anonymous checkout is allowed; an
/// authenticated caller becomes the order's owner.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created from cart", body = crate::services::OrderResponse),
        (status = 400, description = "Empty cart or invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    session: Session,
    Json(payload): Json<CreateOrderInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = Cart::from_session(&session).await.map_err(map_service_error)?;
    let order = state
        .services
        .orders
        .create_order(payload, user.as_ref(), &cart)
        .await
        .map_err(map_service_error)?;

    // The order is durable; only now does the cart go away.
    Cart::clear_session(&session)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// Manually mark an order as paid (owner only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/mark-paid",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order marked paid", body = crate::services::OrderResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller does not own the order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_paid(id, &user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

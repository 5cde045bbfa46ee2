use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    cart::Cart,
    errors::ApiError,
    events::Event,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for the session cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/{product_id}", put(update_item))
        .route("/items/{product_id}", delete(remove_item))
        .route("/quantity", get(total_quantity))
        .route("/clear", post(clear_cart))
}

/// Get the current cart view
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Priced cart view; unavailable products are omitted")
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = Cart::from_session(&session).await.map_err(map_service_error)?;
    let view = state
        .services
        .carts
        .view(&cart)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart view"),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found or unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .get_available_product(payload.product_id)
        .await
        .map_err(map_service_error)?;

    let mut cart = Cart::from_session(&session).await.map_err(map_service_error)?;
    cart.add(&product, payload.quantity, payload.override_quantity);
    cart.persist(&session).await.map_err(map_service_error)?;

    state
        .event_sender
        .send_or_log(Event::CartItemAdded {
            product_id: product.id,
            quantity: payload.quantity,
        })
        .await;

    let view = state
        .services
        .carts
        .view(&cart)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

/// Set a cart line to an exact quantity
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart view"),
        (status = 400, description = "Quantity outside 1-10", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found or unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .get_available_product(product_id)
        .await
        .map_err(map_service_error)?;

    let mut cart = Cart::from_session(&session).await.map_err(map_service_error)?;
    cart.add(&product, payload.quantity, true);
    cart.persist(&session).await.map_err(map_service_error)?;

    state
        .event_sender
        .send_or_log(Event::CartItemAdded {
            product_id,
            quantity: payload.quantity,
        })
        .await;

    let view = state
        .services
        .carts
        .view(&cart)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

/// Remove a product from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Entry removed (or was never present)")
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let mut cart = Cart::from_session(&session).await.map_err(map_service_error)?;
    if cart.remove(product_id) {
        cart.persist(&session).await.map_err(map_service_error)?;
        state
            .event_sender
            .send_or_log(Event::CartItemRemoved { product_id })
            .await;
    }

    Ok(no_content_response())
}

/// Total quantity across all cart entries
#[utoipa::path(
    get,
    path = "/api/v1/cart/quantity",
    responses(
        (status = 200, description = "Sum of stored quantities")
    ),
    tag = "Cart"
)]
pub async fn total_quantity(session: Session) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = Cart::from_session(&session).await.map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "total_quantity": cart.total_quantity()
    })))
}

/// Discard the whole cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/clear",
    responses(
        (status = 200, description = "Cart discarded")
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    Cart::clear_session(&session).await.map_err(map_service_error)?;
    state.event_sender.send_or_log(Event::CartCleared).await;

    Ok(success_response(serde_json::json!({
        "message": "Cart cleared successfully"
    })))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10))]
    pub quantity: u32,
    /// Replace the stored quantity instead of accumulating
    #[serde(default)]
    pub override_quantity: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 10))]
    pub quantity: u32,
}

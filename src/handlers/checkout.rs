use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Router,
};
use uuid::Uuid;

/// Creates the router for checkout-session endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/orders/{id}/session", post(create_checkout_session))
}

/// Create a Stripe hosted-checkout session for an unpaid order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders/{id}/session",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Session created", body = crate::services::CheckoutSessionResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found for caller", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 500, description = "Provider misconfigured or rejected the request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let session = state
        .services
        .payments
        .create_checkout_session(id, &user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(session))
}

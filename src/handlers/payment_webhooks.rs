use crate::{
    errors::ServiceError,
    stripe::{verify_signature, StripeEvent},
    AppState,
};
use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use bytes::Bytes;
use tracing::{info, warn};

/// Stripe-signed payment notifications. Server-to-server, so no CSRF
/// protection; authenticity comes from the signature alone.
///
/// Status contract: 200 for any verified event (including no-ops and
/// duplicates), 400 for signature or payload failures, 404 when the
/// referenced order is unknown (Stripe retries), 500 on internal failure
/// (also retried).
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event accepted (possibly a no-op)"),
        (status = 400, description = "Missing/invalid signature or payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Referenced order unknown", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal failure; provider will retry", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        return Err(ServiceError::ConfigurationError(
            "Stripe webhook secret is not configured".to_string(),
        ));
    };

    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook rejected: missing Stripe-Signature header");
            ServiceError::BadRequest("Missing Stripe-Signature header".to_string())
        })?;

    verify_signature(
        &body,
        signature,
        secret,
        state.config.stripe_webhook_tolerance_secs,
    )
    .map_err(|err| {
        warn!(error = %err, "Webhook rejected: signature verification failed");
        ServiceError::BadRequest(format!("Invalid webhook signature: {}", err))
    })?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|err| ServiceError::BadRequest(format!("Invalid event payload: {}", err)))?;

    if !event.is_completed_payment() {
        // Unhandled event types and incomplete payments are acknowledged
        // without touching any order.
        info!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok((axum::http::StatusCode::OK, "ok"));
    }

    let session = event.checkout_session().ok_or_else(|| {
        ServiceError::BadRequest("Event object is not a checkout session".to_string())
    })?;

    let outcome = state
        .services
        .payments
        .apply_completed_checkout(&session)
        .await?;
    info!(outcome = ?outcome, "Webhook processed");

    Ok((axum::http::StatusCode::OK, "ok"))
}

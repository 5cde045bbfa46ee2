use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::error;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Minimal Stripe client built on reqwest. Only the endpoints this service
/// needs are implemented.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("stripe transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Stripe accepted the connection but rejected the request.
    #[error("{message}")]
    Api { status: u16, message: String },
}

/// One hosted-checkout charge line, in integer minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Parameters for a one-time-payment Checkout Session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    /// Opaque reference echoed back in webhook events; carries the order id.
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
}

/// A created Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, api_base: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }

    /// Creates a hosted Checkout Session in `payment` mode.
    /// See https://stripe.com/docs/payments/checkout
    pub async fn create_checkout_session(
        &self,
        params: &CreateCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        let body = Self::form_body(params);

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        let session: CheckoutSession = resp.json().await?;
        Ok(session)
    }

    /// Stripe's form encoding for nested structures: indexed bracket keys.
    fn form_body(params: &CreateCheckoutSession) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "client_reference_id".to_string(),
                params.client_reference_id.clone(),
            ),
            ("success_url".to_string(), params.success_url.clone()),
            ("cancel_url".to_string(), params.cancel_url.clone()),
        ];

        for (idx, item) in params.line_items.iter().enumerate() {
            body.push((
                format!("line_items[{idx}][price_data][currency]"),
                params.currency.clone(),
            ));
            body.push((
                format!("line_items[{idx}][price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            body.push((
                format!("line_items[{idx}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            body.push((format!("line_items[{idx}][quantity]"), item.quantity.to_string()));
        }

        body
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, StripeError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let message = details
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| format!("{context} failed with status {status}"));

        error!(
            status = %status,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.clone()),
            context = %context,
            "stripe api request failed"
        );

        Err(StripeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_params() -> CreateCheckoutSession {
        CreateCheckoutSession {
            client_reference_id: "order-123".to_string(),
            success_url: "http://localhost:3000/orders/1?paid=true".to_string(),
            cancel_url: "http://localhost:3000/orders/1?canceled=true".to_string(),
            currency: "usd".to_string(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Red Shirt".to_string(),
                    unit_amount: 5000,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Blue Mug".to_string(),
                    unit_amount: 2700,
                    quantity: 1,
                },
            ],
        }
    }

    #[test]
    fn form_body_encodes_payment_mode_and_reference() {
        let body = StripeClient::form_body(&session_params());

        assert!(body.contains(&("mode".to_string(), "payment".to_string())));
        assert!(body.contains(&("client_reference_id".to_string(), "order-123".to_string())));
        assert!(body.contains(&(
            "success_url".to_string(),
            "http://localhost:3000/orders/1?paid=true".to_string()
        )));
    }

    #[test]
    fn form_body_indexes_line_items() {
        let body = StripeClient::form_body(&session_params());

        assert!(body.contains(&(
            "line_items[0][price_data][unit_amount]".to_string(),
            "5000".to_string()
        )));
        assert!(body.contains(&(
            "line_items[0][price_data][product_data][name]".to_string(),
            "Red Shirt".to_string()
        )));
        assert!(body.contains(&("line_items[0][quantity]".to_string(), "2".to_string())));
        assert!(body.contains(&(
            "line_items[1][price_data][unit_amount]".to_string(),
            "2700".to_string()
        )));
        assert!(body.contains(&(
            "line_items[1][price_data][currency]".to_string(),
            "usd".to_string()
        )));
    }
}

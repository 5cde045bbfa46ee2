use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Event type announcing a finished hosted-checkout session.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Why a `Stripe-Signature` header failed verification. Each variant maps to
/// a 400 at the HTTP layer; the distinction is for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Verify a Stripe webhook signature: HMAC-SHA256 over `"{t}.{payload}"`
/// with the shared webhook secret, compared against the `v1` component.
/// See https://stripe.com/docs/webhooks/signatures
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in signature_header.split(',') {
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signature = Some(rest);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    let signature = signature.ok_or(SignatureError::MalformedHeader)?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedHeader)?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).unsigned_abs() > tolerance_secs {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = compute_signature(payload, secret, timestamp);
    if !constant_time_eq(&expected, signature) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Hex HMAC over the timestamped payload.
fn compute_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a complete `Stripe-Signature` header value for a payload. Used by
/// the test suite and local delivery tooling.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    format!("t={},v1={}", ts, compute_signature(payload, secret, &ts))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// A verified webhook event.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The checkout-session object carried by `checkout.session.completed`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub payment_status: Option<String>,
    pub client_reference_id: Option<String>,
    pub payment_intent: Option<String>,
}

impl StripeEvent {
    /// Interpret the event payload as a checkout session, if it is one.
    pub fn checkout_session(&self) -> Option<CheckoutSessionObject> {
        serde_json::from_value(self.data.object.clone()).ok()
    }

    /// True for a completed one-time payment: the only shape that moves an
    /// order to paid.
    pub fn is_completed_payment(&self) -> bool {
        if self.event_type != CHECKOUT_SESSION_COMPLETED {
            return false;
        }
        match self.checkout_session() {
            Some(session) => {
                session.mode.as_deref() == Some("payment")
                    && session.payment_status.as_deref() == Some("paid")
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const TOLERANCE: u64 = 300;

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = signature_header(payload, SECRET, now());

        assert_eq!(
            verify_signature(payload, &header, SECRET, TOLERANCE),
            Ok(())
        );
    }

    #[test]
    fn signature_from_wrong_secret_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = signature_header(payload, "wrong_secret", now());

        assert_eq!(
            verify_signature(payload, &header, SECRET, TOLERANCE),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn modified_payload_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = signature_header(payload, SECRET, now());
        let tampered = br#"{"type":"checkout.session.expired"}"#;

        assert_eq!(
            verify_signature(tampered, &header, SECRET, TOLERANCE),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = br#"{}"#;
        // 10 minutes old, beyond the 5-minute tolerance.
        let header = signature_header(payload, SECRET, now() - 600);

        assert_eq!(
            verify_signature(payload, &header, SECRET, TOLERANCE),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        let payload = br#"{}"#;

        for header in ["", "t=123", "v1=deadbeef", "t=abc,v1=deadbeef", "garbage"] {
            assert_eq!(
                verify_signature(payload, header, SECRET, TOLERANCE),
                Err(SignatureError::MalformedHeader),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn completed_payment_event_is_recognized() {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "mode": "payment",
                "payment_status": "paid",
                "client_reference_id": "8b9c0a9e-1111-2222-3333-444455556666",
                "payment_intent": "pi_123"
            }}
        });
        let event: StripeEvent = serde_json::from_value(payload).unwrap();

        assert!(event.is_completed_payment());
        let session = event.checkout_session().unwrap();
        assert_eq!(session.payment_intent.as_deref(), Some("pi_123"));
    }

    #[test]
    fn unpaid_or_foreign_events_are_not_completed_payments() {
        let unpaid: StripeEvent = serde_json::from_value(serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "mode": "payment", "payment_status": "unpaid" } }
        }))
        .unwrap();
        assert!(!unpaid.is_completed_payment());

        let subscription: StripeEvent = serde_json::from_value(serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "mode": "subscription", "payment_status": "paid" } }
        }))
        .unwrap();
        assert!(!subscription.is_completed_payment());

        let other: StripeEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": { "object": {} }
        }))
        .unwrap();
        assert!(!other.is_completed_payment());
    }
}

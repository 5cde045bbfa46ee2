//! Stripe integration: a minimal API client for hosted checkout and the
//! webhook signature/event machinery.

pub mod client;
pub mod webhook;

pub use client::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutSession, StripeClient, StripeError,
};
pub use webhook::{
    signature_header, verify_signature, CheckoutSessionObject, SignatureError, StripeEvent,
    CHECKOUT_SESSION_COMPLETED,
};

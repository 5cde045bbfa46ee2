use crate::{
    auth::AuthUser,
    config::AppConfig,
    entities::{order, order_item, product, Order, OrderItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
    stripe::{
        CheckoutLineItem, CheckoutSessionObject, CreateCheckoutSession, StripeClient, StripeError,
    },
};
use chrono::Utc;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Bridges unpaid orders to Stripe hosted checkout and applies verified
/// payment confirmations back onto them.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    /// Absent when no usable secret key is configured; checkout then fails
    /// with a configuration error before any provider call.
    stripe: Option<StripeClient>,
    currency: String,
    frontend_base_url: String,
}

/// A freshly created hosted-checkout session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    /// Provider-hosted payment page the front-end redirects to.
    pub url: String,
}

/// What a verified completed-checkout event did to the referenced order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The order transitioned unpaid -> paid.
    MarkedPaid { order_id: Uuid },
    /// The order was already paid; duplicate delivery, nothing changed.
    AlreadyPaid { order_id: Uuid },
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let stripe = config
            .stripe_secret()
            .map(|key| StripeClient::new(key.to_string(), config.stripe_api_base.clone()));
        Self {
            db,
            event_sender,
            stripe,
            currency: config.currency.clone(),
            frontend_base_url: config.frontend_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a Stripe Checkout Session for an unpaid order owned by the
    /// caller and persist the session id on the order. A retry overwrites
    /// the previous session id; the newest session wins.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        user: &AuthUser,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.paid {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already paid",
                order_id
            )));
        }

        let Some(stripe) = &self.stripe else {
            return Err(ServiceError::ConfigurationError(
                "Stripe secret key is missing or a placeholder".to_string(),
            ));
        };

        let line_items = self.line_items_for(order_id).await?;
        let params = CreateCheckoutSession {
            client_reference_id: order_id.to_string(),
            success_url: format!("{}/orders/{}?paid=true", self.frontend_base_url, order_id),
            cancel_url: format!("{}/orders/{}?canceled=true", self.frontend_base_url, order_id),
            currency: self.currency.clone(),
            line_items,
        };

        let session = stripe
            .create_checkout_session(&params)
            .await
            .map_err(|err| match err {
                StripeError::Api { message, .. } => ServiceError::PaymentProvider(message),
                StripeError::Transport(e) => ServiceError::PaymentProvider(e.to_string()),
            })?;

        let mut active: order::ActiveModel = order.into();
        active.stripe_session_id = Set(Some(session.id.clone()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                order_id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Apply a verified `checkout.session.completed` payment to its order:
    /// one-way unpaid -> paid, recording the payment-intent id. Safe under
    /// at-least-once delivery; a duplicate is acknowledged without mutation.
    #[instrument(skip(self, session))]
    pub async fn apply_completed_checkout(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<PaymentOutcome, ServiceError> {
        let reference = session
            .client_reference_id
            .as_deref()
            .ok_or_else(|| ServiceError::BadRequest("Event has no order reference".to_string()))?;
        let order_id: Uuid = reference.parse().map_err(|_| {
            ServiceError::BadRequest(format!("Invalid order reference: {}", reference))
        })?;

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.paid {
            info!(order_id = %order_id, "Duplicate payment confirmation ignored");
            return Ok(PaymentOutcome::AlreadyPaid { order_id });
        }

        let payment_intent = session.payment_intent.clone();
        let mut active: order::ActiveModel = order.into();
        active.paid = Set(true);
        active.stripe_payment_intent = Set(payment_intent.clone());
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderPaid {
                order_id,
                payment_intent,
            })
            .await;

        Ok(PaymentOutcome::MarkedPaid { order_id })
    }

    /// Build provider charge lines from the order's frozen item prices.
    async fn line_items_for(&self, order_id: Uuid) -> Result<Vec<CheckoutLineItem>, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        items
            .into_iter()
            .map(|item| {
                let unit_amount = to_minor_units(item.price)?;
                Ok(CheckoutLineItem {
                    name: names.get(&item.product_id).cloned().unwrap_or_default(),
                    unit_amount,
                    quantity: item.quantity as u32,
                })
            })
            .collect()
    }
}

/// Convert a 2dp decimal price into integer minor currency units.
fn to_minor_units(price: Decimal) -> Result<i64, ServiceError> {
    (price * Decimal::from(100))
        .round_dp(0)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Price {} out of range for minor units", price))
        })
}

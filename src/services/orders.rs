use crate::{
    auth::AuthUser,
    cart::Cart,
    entities::{order, order_item, product, Order, OrderItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order placement and queries. Creation snapshots cart contents into order
/// items inside one transaction; payment-status transitions live in
/// `services::payments`.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

/// Header fields supplied by the buyer at order placement.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 250))]
    pub address: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    /// Unit price frozen at order creation.
    #[schema(value_type = String, example = "27.00")]
    pub price: Decimal,
    pub quantity: i32,
    /// price × quantity
    #[schema(value_type = String, example = "81.00")]
    pub cost: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub city: String,
    pub address: String,
    pub postal_code: String,
    pub paid: bool,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    /// Sum of the frozen line costs.
    #[schema(value_type = String, example = "127.00")]
    pub total_cost: Decimal,
}

impl OrderResponse {
    fn from_parts(order: order::Model, items: Vec<OrderItemResponse>) -> Self {
        let total_cost = items.iter().map(|item| item.cost).sum();
        Self {
            id: order.id,
            user_id: order.user_id,
            first_name: order.first_name,
            last_name: order.last_name,
            email: order.email,
            city: order.city,
            address: order.address,
            postal_code: order.postal_code,
            paid: order.paid,
            stripe_session_id: order.stripe_session_id,
            stripe_payment_intent: order.stripe_payment_intent,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
            total_cost,
        }
    }
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Place an order from the session cart.
    ///
    /// Header validation, order insertion and order-item materialization run
    /// inside one transaction; a failure anywhere rolls the whole order back.
    /// The caller clears the session cart only after this returns Ok.
    #[instrument(skip(self, input, cart), fields(items = cart.len()))]
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
        user: Option<&AuthUser>,
        cart: &Cart,
    ) -> Result<OrderResponse, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }
        input.validate()?;

        let txn = self.db.begin().await?;

        // Re-resolve every cart entry against the live catalog; entries whose
        // product vanished or went unavailable are skipped, same as the cart
        // view. The order freezes the effective sell price at this moment.
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(cart.product_ids()))
            .filter(product::Column::Available.eq(true))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let mut item_models = Vec::with_capacity(cart.len());
        let mut item_responses = Vec::with_capacity(cart.len());
        for (product_id, entry) in cart.entries() {
            let Some(product) = products.get(product_id) else {
                warn!(product_id = %product_id, "Skipping unavailable product at order creation");
                continue;
            };
            let price = product.sell_price();
            let quantity = entry.quantity as i32;
            let item_id = Uuid::new_v4();
            item_models.push(order_item::ActiveModel {
                id: Set(item_id),
                order_id: Set(order_id),
                product_id: Set(product.id),
                price: Set(price),
                quantity: Set(quantity),
            });
            item_responses.push(OrderItemResponse {
                id: item_id,
                product_id: product.id,
                product_name: product.name.clone(),
                price,
                quantity,
                cost: price * Decimal::from(quantity),
            });
        }

        // Every entry pointed at a vanished product: abort instead of
        // materializing an order that bills for nothing.
        if item_models.is_empty() {
            return Err(ServiceError::ValidationError(
                "No purchasable products in cart".to_string(),
            ));
        }

        let header = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user.map(|u| u.id)),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(input.email),
            city: Set(input.city),
            address: Set(input.address),
            postal_code: Set(input.postal_code),
            paid: Set(false),
            stripe_session_id: Set(None),
            stripe_payment_intent: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let header = header.insert(&txn).await?;
        OrderItem::insert_many(item_models).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        Ok(OrderResponse::from_parts(header, item_responses))
    }

    /// Orders visible to the caller, newest first. Staff see everything;
    /// everyone else sees their own.
    ///
    /// First-listing reconciliation: a user with no owned orders adopts
    /// anonymous orders bearing their email, so purchases made before
    /// registering show up under the account.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list_for_user(&self, user: &AuthUser) -> Result<Vec<OrderResponse>, ServiceError> {
        if user.is_staff {
            let orders = Order::find()
                .order_by_desc(order::Column::CreatedAt)
                .all(&*self.db)
                .await?;
            return self.with_items(orders).await;
        }

        let owned = Order::find()
            .filter(order::Column::UserId.eq(user.id))
            .count(&*self.db)
            .await?;
        if owned == 0 {
            self.adopt_anonymous_orders(user).await?;
        }

        let orders = Order::find()
            .filter(order::Column::UserId.eq(user.id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.with_items(orders).await
    }

    /// Retrieve one order. Owners and staff see it; anyone else gets a 404
    /// rather than confirmation that the order exists.
    pub async fn get_for_user(
        &self,
        order_id: Uuid,
        user: &AuthUser,
    ) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| user.is_staff || o.user_id == Some(user.id))
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut responses = self.with_items(vec![order]).await?;
        Ok(responses.remove(0))
    }

    /// Operator/owner override: flip an order to paid without a provider
    /// event. Strictly owner-only; one-way like the webhook transition, so
    /// repeating it is a no-op.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        user: &AuthUser,
    ) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != Some(user.id) {
            return Err(ServiceError::Forbidden(
                "Not authorized to modify this order".to_string(),
            ));
        }

        let order = if order.paid {
            order
        } else {
            let mut active: order::ActiveModel = order.into();
            active.paid = Set(true);
            active.updated_at = Set(Utc::now());
            let updated = active.update(&*self.db).await?;
            self.event_sender
                .send_or_log(Event::OrderMarkedPaid(order_id))
                .await;
            updated
        };

        let mut responses = self.with_items(vec![order]).await?;
        Ok(responses.remove(0))
    }

    /// Re-own anonymous orders that carry the user's email. Runs only when
    /// the user owns nothing yet, which bounds the effect of a reused email.
    async fn adopt_anonymous_orders(&self, user: &AuthUser) -> Result<(), ServiceError> {
        let anonymous = Order::find()
            .filter(order::Column::UserId.is_null())
            .filter(order::Column::Email.eq(user.email.clone()))
            .all(&*self.db)
            .await?;
        if anonymous.is_empty() {
            return Ok(());
        }

        for order in anonymous {
            let order_id = order.id;
            let mut active: order::ActiveModel = order.into();
            active.user_id = Set(Some(user.id));
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
            info!(order_id = %order_id, user_id = %user.id, "Adopted anonymous order by email match");
        }
        Ok(())
    }

    /// Join orders with their items and product names.
    async fn with_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        };

        let mut grouped: HashMap<Uuid, Vec<OrderItemResponse>> = HashMap::new();
        for item in items {
            let cost = item.cost();
            grouped
                .entry(item.order_id)
                .or_default()
                .push(OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: names.get(&item.product_id).cloned().unwrap_or_default(),
                    price: item.price,
                    quantity: item.quantity,
                    cost,
                });
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = grouped.remove(&order.id).unwrap_or_default();
                OrderResponse::from_parts(order, items)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateOrderInput {
        CreateOrderInput {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            city: "London".to_string(),
            address: "12 St James Square".to_string(),
            postal_code: "SW1Y".to_string(),
        }
    }

    #[test]
    fn valid_input_passes_validation() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn malformed_email_fails_validation() {
        let mut bad = input();
        bad.email = "not-an-email".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn empty_header_fields_fail_validation() {
        let mut bad = input();
        bad.first_name = String::new();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.postal_code = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn total_cost_sums_frozen_line_costs() {
        use rust_decimal_macros::dec;

        let order = order::Model {
            id: Uuid::new_v4(),
            user_id: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            city: "London".to_string(),
            address: "12 St James Square".to_string(),
            postal_code: "SW1Y".to_string(),
            paid: false,
            stripe_session_id: None,
            stripe_payment_intent: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![
            OrderItemResponse {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                product_name: "A".to_string(),
                price: dec!(50.00),
                quantity: 2,
                cost: dec!(100.00),
            },
            OrderItemResponse {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                product_name: "B".to_string(),
                price: dec!(27.00),
                quantity: 1,
                cost: dec!(27.00),
            },
        ];

        let response = OrderResponse::from_parts(order, items);
        assert_eq!(response.total_cost, dec!(127.00));
    }
}

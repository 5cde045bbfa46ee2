use crate::{entities::product, errors::ServiceError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_sessions::Session;
use uuid::Uuid;

/// Session key under which the cart is stored.
pub const CART_KEY: &str = "cart";

/// Upper bound on the quantity of a single product in the cart.
pub const MAX_QUANTITY: u32 = 10;

/// One cart line: how many units and the list price snapshotted when the
/// product was first added. The snapshot is not live-refreshed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Session-scoped shopping cart: a typed mapping from product id to entry.
///
/// The cart lives entirely inside the request session; it has no table of its
/// own and disappears with the session. Entries referencing products that
/// have since become unavailable stay in the stored structure until removed
/// explicitly, but priced views skip them (see `services::carts`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: BTreeMap<Uuid, CartEntry>,
}

impl Cart {
    /// Add a product to the cart. With `override_quantity` the stored
    /// quantity is replaced, otherwise it accumulates. The unit price is
    /// captured from the product on first insert and kept on later adds.
    /// Quantities are clamped to `MAX_QUANTITY`.
    pub fn add(&mut self, product: &product::Model, quantity: u32, override_quantity: bool) {
        let entry = self.items.entry(product.id).or_insert(CartEntry {
            quantity: 0,
            unit_price: product.price,
        });

        entry.quantity = if override_quantity {
            quantity
        } else {
            entry.quantity.saturating_add(quantity)
        }
        .min(MAX_QUANTITY);
    }

    /// Remove a product's entry entirely. Returns whether it was present.
    pub fn remove(&mut self, product_id: Uuid) -> bool {
        self.items.remove(&product_id).is_some()
    }

    pub fn get(&self, product_id: Uuid) -> Option<&CartEntry> {
        self.items.get(&product_id)
    }

    /// Iterate entries in stable (product-id) order.
    pub fn entries(&self) -> impl Iterator<Item = (&Uuid, &CartEntry)> {
        self.items.iter()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.items.keys().copied().collect()
    }

    /// Sum of quantities across all entries.
    pub fn total_quantity(&self) -> u32 {
        self.items.values().map(|entry| entry.quantity).sum()
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Load the cart from the session, defaulting to empty.
    pub async fn from_session(session: &Session) -> Result<Self, ServiceError> {
        session
            .get::<Cart>(CART_KEY)
            .await
            .map_err(|e| ServiceError::SessionError(e.to_string()))
            .map(Option::unwrap_or_default)
    }

    /// Write the cart back into the session. Every mutation must be followed
    /// by a persist so the session layer sees the change.
    pub async fn persist(&self, session: &Session) -> Result<(), ServiceError> {
        session
            .insert(CART_KEY, self.clone())
            .await
            .map_err(|e| ServiceError::SessionError(e.to_string()))
    }

    /// Drop the stored cart from the session entirely.
    pub async fn clear_session(session: &Session) -> Result<(), ServiceError> {
        session
            .remove::<Cart>(CART_KEY)
            .await
            .map_err(|e| ServiceError::SessionError(e.to_string()))?;
        Ok(())
    }
}

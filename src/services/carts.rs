use crate::{
    cart::Cart,
    entities::{
        product::{self, apply_discount},
        Product,
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

/// Builds priced views of a session cart by joining its entries with the
/// catalog. The stored cart is never mutated here.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

/// One displayable cart line. `unit_price` is the entry's snapshotted price
/// with the product's current discount applied.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub product: product::Model,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Sum over every stored entry, including ones hidden from `items`
    /// because their product is currently unavailable.
    pub total_quantity: u32,
    pub total_price: Decimal,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Join cart entries with currently-available products. Entries whose
    /// product is missing or unavailable are silently dropped from the view;
    /// they remain in the stored cart until explicitly removed.
    pub async fn view(&self, cart: &Cart) -> Result<CartView, ServiceError> {
        let ids = cart.product_ids();
        let products: HashMap<Uuid, product::Model> = if ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(ids))
                .filter(product::Column::Available.eq(true))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let mut items = Vec::with_capacity(cart.len());
        let mut total_price = Decimal::ZERO;
        for (product_id, entry) in cart.entries() {
            let Some(product) = products.get(product_id) else {
                continue;
            };
            let unit_price = apply_discount(entry.unit_price, product.discount);
            let line_total = unit_price * Decimal::from(entry.quantity);
            total_price += line_total;
            items.push(CartLine {
                product: product.clone(),
                quantity: entry.quantity,
                unit_price,
                total_price: line_total,
            });
        }

        Ok(CartView {
            items,
            total_quantity: cart.total_quantity(),
            total_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_applies_to_snapshotted_price() {
        // Stored snapshot 30.00, product now discounted 10% -> display 27.00.
        assert_eq!(apply_discount(dec!(30.00), 10), dec!(27.00));
        assert_eq!(apply_discount(dec!(50.00), 0), dec!(50.00));
    }

    #[test]
    fn line_total_accumulates_per_quantity() {
        let unit = apply_discount(dec!(30.00), 10);
        assert_eq!(unit * Decimal::from(3u32), dec!(81.00));
    }
}

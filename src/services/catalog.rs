use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-only catalog access. The catalog is the authoritative source of
/// price and availability at cart-mutation and order-creation time; writes
/// happen through back-office tooling, not this API.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All currently purchasable products, ordered by name.
    #[instrument(skip(self))]
    pub async fn list_available(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find()
            .filter(product::Column::Available.eq(true))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(products)
    }

    /// Fetch a product regardless of availability (detail pages may show
    /// sold-out items).
    pub async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Fetch a product that must be available; used by cart adds.
    pub async fn get_available_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .filter(product::Column::Available.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found or not available", id))
            })
    }
}

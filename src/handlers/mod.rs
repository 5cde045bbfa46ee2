pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use crate::{config::AppConfig, events::EventSender, services};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<services::CatalogService>,
    pub carts: Arc<services::CartService>,
    pub orders: Arc<services::OrderService>,
    pub payments: Arc<services::PaymentService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(services::CatalogService::new(db.clone())),
            carts: Arc::new(services::CartService::new(db.clone())),
            orders: Arc::new(services::OrderService::new(db.clone(), event_sender.clone())),
            payments: Arc::new(services::PaymentService::new(db, event_sender, config)),
        }
    }
}

pub mod carts;
pub mod catalog;
pub mod orders;
pub mod payments;

pub use carts::{CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use orders::{CreateOrderInput, OrderItemResponse, OrderResponse, OrderService};
pub use payments::{CheckoutSessionResponse, PaymentOutcome, PaymentService};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Product catalog, session-scoped shopping cart, order placement, and Stripe
hosted-checkout reconciliation.

## Authentication

Order and checkout endpoints require a bearer token minted by the identity
system:

```
Authorization: Bearer <your-jwt-token>
```

The cart is anonymous and tracked by a session cookie. Order creation accepts
anonymous callers; anonymous orders are later re-owned by email match when the
buyer signs in.

## Payment flow

1. `POST /api/v1/orders` snapshots the cart into an order.
2. `POST /api/v1/checkout/orders/{id}/session` creates a Stripe Checkout
   session and returns the redirect URL.
3. Stripe calls `POST /api/v1/payments/webhook` (signed) once the buyer pays;
   the order transitions to `paid` exactly once.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Catalog reads"),
        (name = "Cart", description = "Session cart operations"),
        (name = "Orders", description = "Order placement and queries"),
        (name = "Checkout", description = "Hosted-checkout session creation"),
        (name = "Payments", description = "Provider webhook endpoint")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::total_quantity,
        crate::handlers::carts::clear_cart,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::mark_paid,
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(
        schemas(
            crate::handlers::carts::AddItemRequest,
            crate::handlers::carts::UpdateQuantityRequest,
            crate::services::CreateOrderInput,
            crate::services::OrderResponse,
            crate::services::OrderItemResponse,
            crate::services::CheckoutSessionResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

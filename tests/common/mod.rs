// Not every test binary exercises every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    app_router,
    auth::issue_token,
    config::AppConfig,
    db,
    entities::{product, user},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only";

/// Helper harness: the full application router over an in-memory SQLite
/// database, with direct access to the underlying state for seeding.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

/// A decoded response: status, session cookie (if one was set), JSON body.
pub struct TestResponse {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub body: Value,
}

impl TestApp {
    /// Construct a test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like `new`, but lets the test adjust configuration (Stripe keys,
    /// webhook secret, API base) before the services are built.
    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", JWT_SECRET, "127.0.0.1", 0, "test");
        // A single connection keeps every query on the same in-memory DB.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = std::sync::Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg);
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: app_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    /// Send one request through the router. `cookie` carries the session
    /// across calls; the response's `cookie` field is the value to thread
    /// into the next one.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");
        Self::decode(response).await
    }

    /// Deliver a raw webhook payload, optionally with a signature header.
    pub async fn post_webhook(&self, payload: &[u8], signature: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("Stripe-Signature", signature);
        }
        let request = builder
            .body(Body::from(payload.to_vec()))
            .expect("failed to build webhook request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");
        Self::decode(response).await
    }

    async fn decode(response: axum::response::Response) -> TestResponse {
        let status = response.status();
        let cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            cookie,
            body,
        }
    }

    /// Seed a catalog product.
    pub async fn insert_product(
        &self,
        name: &str,
        price: Decimal,
        discount: i32,
        available: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            slug: Set(format!("{}-{}", name.to_lowercase().replace(' ', "-"), id)),
            description: Set(String::new()),
            price: Set(price),
            discount: Set(discount),
            available: Set(available),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert product");
        id
    }

    /// Flip a product's availability.
    pub async fn set_product_available(&self, id: Uuid, available: bool) {
        let active = product::ActiveModel {
            id: Set(id),
            available: Set(available),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        active
            .update(&*self.state.db)
            .await
            .expect("failed to update product availability");
    }

    /// Change a product's list price and discount.
    pub async fn set_product_price(&self, id: Uuid, price: Decimal, discount: i32) {
        let active = product::ActiveModel {
            id: Set(id),
            price: Set(price),
            discount: Set(discount),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        active
            .update(&*self.state.db)
            .await
            .expect("failed to update product price");
    }

    /// Seed a user and mint a bearer token for them.
    pub async fn insert_user(&self, username: &str, email: &str, is_staff: bool) -> (Uuid, String) {
        let id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(id),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_staff: Set(is_staff),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert user");

        let token = issue_token(id, email, username, is_staff, JWT_SECRET, 3600)
            .expect("failed to issue token");
        (id, token)
    }
}

/// Order-header payload accepted by POST /api/v1/orders.
pub fn order_payload(email: &str) -> Value {
    serde_json::json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "city": "London",
        "address": "12 St James Square",
        "postal_code": "SW1Y 4LB",
    })
}

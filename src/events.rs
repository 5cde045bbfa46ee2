use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Domain events emitted by the cart/order/payment flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded { product_id: Uuid, quantity: u32 },
    CartItemRemoved { product_id: Uuid },
    CartCleared,

    // Order events
    OrderCreated(Uuid),
    OrderPaid {
        order_id: Uuid,
        payment_intent: Option<String>,
    },
    OrderMarkedPaid(Uuid),

    // Checkout events
    CheckoutSessionCreated {
        order_id: Uuid,
        session_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing if the channel is closed.
    /// Event delivery is never allowed to fail a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Background consumer for domain events. Currently events are logged;
/// downstream integrations subscribe here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderPaid {
                order_id,
                payment_intent,
            } => {
                info!(order_id = %order_id, payment_intent = ?payment_intent, "Order paid");
            }
            Event::OrderMarkedPaid(order_id) => {
                info!(order_id = %order_id, "Order manually marked paid");
            }
            Event::CheckoutSessionCreated {
                order_id,
                session_id,
            } => {
                info!(order_id = %order_id, session_id = %session_id, "Checkout session created");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}

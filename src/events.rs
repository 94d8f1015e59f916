use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout pipeline for external listeners
/// (fulfillment, notifications, analytics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        session_id: Uuid,
        customer_id: Uuid,
    },
    BillingAddressAssigned {
        customer_id: Uuid,
        address_id: Uuid,
    },
    ShippingAddressAssigned {
        customer_id: Uuid,
        address_id: Uuid,
    },
    ShippingMethodSelected {
        customer_id: Uuid,
        shipping_method_id: i32,
        provider: String,
    },
    PaymentMethodSelected {
        customer_id: Uuid,
        provider: String,
    },
    OrderPlaced {
        order_id: Uuid,
        customer_id: Uuid,
    },
    CheckoutCompleted {
        session_id: Uuid,
        order_id: Uuid,
    },
    CheckoutAbandoned {
        session_id: Uuid,
    },
}

/// Sender half of the event pipeline.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, returning an error when the receiver is gone.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when delivery is
    /// impossible. Checkout progress must never depend on listeners.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropped event: {}", e);
        }
    }
}

/// Creates an event channel and a logging consumer task.
pub fn event_channel(buffer: usize) -> (EventSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(?event, "checkout event");
        }
    });
    (EventSender::new(tx), handle)
}

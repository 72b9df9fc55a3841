use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Buffer size for the in-process event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the quote services after a successful commit.
///
/// Consumers (notification fan-out, projections, webhooks in the surrounding
/// application) receive these over an mpsc channel; emission never
/// participates in the originating transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuoteCreated(Uuid),
    QuoteItemAdded {
        quote_id: Uuid,
        item_id: Uuid,
    },
    QuoteItemUpdated {
        quote_id: Uuid,
        item_id: Uuid,
    },
    QuoteItemRemoved {
        quote_id: Uuid,
        item_id: Uuid,
    },
    QuoteStatusChanged {
        quote_id: Uuid,
        old_status: String,
        new_status: String,
    },
    QuoteExpired(Uuid),
    QuoteConverted {
        quote_id: Uuid,
        order_id: Uuid,
    },
    QuoteDuplicated {
        source_id: Uuid,
        new_id: Uuid,
    },
    QuoteDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing if the receiver is gone.
    /// Events are advisory: a full or closed channel never fails the
    /// operation that produced them.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Failed to deliver event");
        }
    }
}

/// Builds the event channel used by [`crate::AppState`].
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender::new(tx), rx)
}

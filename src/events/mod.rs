use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::delivery_order::OrderStatus;
use crate::notifications::NotificationDispatcher;

/// Domain events published after a delivery workflow transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// `old_status` is `None` when the order was just created.
    DeliveryStatusChanged {
        event_id: Uuid,
        order_id: Uuid,
        old_status: Option<OrderStatus>,
        new_status: OrderStatus,
        occurred_at: DateTime<Utc>,
    },
    DeliveryPaymentRecorded {
        event_id: Uuid,
        order_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        due_amount: Decimal,
        occurred_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn status_changed(
        order_id: Uuid,
        old_status: Option<OrderStatus>,
        new_status: OrderStatus,
    ) -> Self {
        Event::DeliveryStatusChanged {
            event_id: Uuid::new_v4(),
            order_id,
            old_status,
            new_status,
            occurred_at: Utc::now(),
        }
    }

    pub fn payment_recorded(
        order_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        due_amount: Decimal,
    ) -> Self {
        Event::DeliveryPaymentRecorded {
            event_id: Uuid::new_v4(),
            order_id,
            transaction_id,
            amount,
            due_amount,
            occurred_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::DeliveryStatusChanged { .. } => "delivery_status_changed",
            Event::DeliveryPaymentRecorded { .. } => "delivery_payment_recorded",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            Event::DeliveryStatusChanged { order_id, .. }
            | Event::DeliveryPaymentRecorded { order_id, .. } => *order_id,
        }
    }
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

    /// Publishes without waiting. A full or closed channel drops the event
    /// with a warning; callers never fail because of it.
    pub fn send_or_log(&self, event: Event) {
        let name = event.name();
        let order_id = event.order_id();
        match self.sender.try_send(event) {
            Ok(()) => debug!(event = name, %order_id, "event published"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!("delivery_events.dropped", 1);
                warn!(event = name, %order_id, "event channel full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                counter!("delivery_events.dropped", 1);
                warn!(event = name, %order_id, "event channel closed, event dropped");
            }
        }
    }
}

/// Consumes events until every sender is dropped. Status changes are handed
/// to the notification dispatcher on their own tasks; those tasks are awaited
/// before returning.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    dispatcher: Arc<NotificationDispatcher>,
) {
    info!("Starting event processing loop");
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(event) = received else { break };
                handle_event(event, &dispatcher, &mut tasks);
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("notification task failed: {}", e);
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("notification task failed: {}", e);
        }
    }
    info!("Event processing loop stopped");
}

fn handle_event(event: Event, dispatcher: &Arc<NotificationDispatcher>, tasks: &mut JoinSet<()>) {
    debug!(event = event.name(), order_id = %event.order_id(), "received event");

    match event {
        Event::DeliveryStatusChanged {
            event_id,
            order_id,
            old_status,
            new_status,
            ..
        } => {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move {
                dispatcher
                    .dispatch_status_change(event_id, order_id, old_status, new_status)
                    .await;
            });
        }
        Event::DeliveryPaymentRecorded {
            order_id,
            transaction_id,
            amount,
            due_amount,
            ..
        } => {
            counter!("delivery_events.payments", 1);
            info!(
                %order_id,
                %transaction_id,
                %amount,
                %due_amount,
                "delivery payment recorded"
            );
        }
    }
}

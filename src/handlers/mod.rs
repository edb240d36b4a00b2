pub mod common;
pub mod delivery_orders;
pub mod shipments;
pub mod tracking;

use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    i18n::Locale,
    rate_limiter::RateLimiter,
    services::{
        delivery_orders::DeliveryOrderService, delivery_payments::DeliveryPaymentService,
        delivery_status::DeliveryStatusService, order_locks::OrderLocks,
        shipments::ShipmentService, tracking::TrackingLookupService,
    },
    storage::DocumentStore,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub delivery_orders: Arc<DeliveryOrderService>,
    pub delivery_status: Arc<DeliveryStatusService>,
    pub delivery_payments: Arc<DeliveryPaymentService>,
    pub shipments: Arc<ShipmentService>,
    pub tracking: Arc<TrackingLookupService>,
    pub order_locks: OrderLocks,
}

impl AppServices {
    /// All order mutations share one lock registry.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        limiter: Arc<RateLimiter>,
        documents: Arc<dyn DocumentStore>,
        label_locale: Locale,
    ) -> Self {
        let order_locks = OrderLocks::new();
        Self {
            delivery_orders: Arc::new(DeliveryOrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                order_locks.clone(),
            )),
            delivery_status: Arc::new(
                DeliveryStatusService::new(db_pool.clone(), event_sender.clone(), order_locks.clone())
                    .with_label_locale(label_locale),
            ),
            delivery_payments: Arc::new(DeliveryPaymentService::new(
                db_pool.clone(),
                event_sender,
                order_locks.clone(),
            )),
            shipments: Arc::new(ShipmentService::new(db_pool.clone(), order_locks.clone())),
            tracking: Arc::new(TrackingLookupService::new(db_pool, limiter, documents)),
            order_locks,
        }
    }
}

// Delivery order workflow
pub mod delivery_orders;
pub mod delivery_payments;
pub mod delivery_status;

// Stock movements and per-order serialization
pub mod inventory;
pub mod order_locks;

// Shipments and public tracking
pub mod shipments;
pub mod tracking;

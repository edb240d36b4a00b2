pub mod carrier;
pub mod delivery_order;
pub mod inventory_movement;
pub mod item_transaction;
pub mod order_status_history;
pub mod party;
pub mod payment_transaction;
pub mod payment_type;
pub mod product;
pub mod shipment_document;
pub mod shipment_tracking;
pub mod tracking_event;

/// Photo references are stored as a JSON array in a text column.
pub fn encode_photos(photos: &[String]) -> Option<String> {
    if photos.is_empty() {
        return None;
    }
    serde_json::to_string(photos).ok()
}

pub fn decode_photos(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

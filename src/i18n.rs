//! Localized labels for statuses and documents, and push notification copy.

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entities::delivery_order::OrderStatus;
use crate::entities::shipment_document::DocumentType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Locale {
    #[default]
    En,
    Id,
}

impl Locale {
    /// Picks the first supported language from an `Accept-Language` value,
    /// e.g. `id-ID,id;q=0.9,en;q=0.8`. Quality weights are not reordered.
    pub fn from_accept_language(value: &str) -> Option<Self> {
        value
            .split(',')
            .filter_map(|part| part.split(';').next())
            .map(|tag| tag.trim())
            .filter_map(|tag| tag.split(['-', '_']).next())
            .find_map(|lang| lang.parse::<Locale>().ok())
    }

    pub fn from_headers(headers: &HeaderMap, fallback: Locale) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_accept_language)
            .unwrap_or(fallback)
    }
}

pub fn status_label(status: OrderStatus, locale: Locale) -> &'static str {
    match (locale, status) {
        (Locale::En, OrderStatus::Pending) => "Pending",
        (Locale::En, OrderStatus::Processing) => "Processing",
        (Locale::En, OrderStatus::Delivery) => "Out for delivery",
        (Locale::En, OrderStatus::POD) => "Delivered",
        (Locale::En, OrderStatus::Returned) => "Returned",
        (Locale::En, OrderStatus::Cancelled) => "Cancelled",
        (Locale::Id, OrderStatus::Pending) => "Menunggu",
        (Locale::Id, OrderStatus::Processing) => "Diproses",
        (Locale::Id, OrderStatus::Delivery) => "Dalam pengiriman",
        (Locale::Id, OrderStatus::POD) => "Terkirim",
        (Locale::Id, OrderStatus::Returned) => "Dikembalikan",
        (Locale::Id, OrderStatus::Cancelled) => "Dibatalkan",
    }
}

pub fn document_label(document_type: DocumentType, locale: Locale) -> &'static str {
    match (locale, document_type) {
        (Locale::En, DocumentType::Waybill) => "Waybill",
        (Locale::En, DocumentType::Invoice) => "Invoice",
        (Locale::En, DocumentType::ProofOfDelivery) => "Proof of delivery",
        (Locale::En, DocumentType::Photo) => "Photo",
        (Locale::En, DocumentType::Other) => "Other document",
        (Locale::Id, DocumentType::Waybill) => "Surat jalan",
        (Locale::Id, DocumentType::Invoice) => "Faktur",
        (Locale::Id, DocumentType::ProofOfDelivery) => "Bukti pengiriman",
        (Locale::Id, DocumentType::Photo) => "Foto",
        (Locale::Id, DocumentType::Other) => "Dokumen lain",
    }
}

/// Title and body of a customer push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationText {
    pub title: String,
    pub body: String,
}

pub fn new_order_notification(order_code: &str, locale: Locale) -> NotificationText {
    match locale {
        Locale::En => NotificationText {
            title: "Order received".to_string(),
            body: format!("Your order {} has been received.", order_code),
        },
        Locale::Id => NotificationText {
            title: "Pesanan diterima".to_string(),
            body: format!("Pesanan {} telah kami terima.", order_code),
        },
    }
}

pub fn status_changed_notification(
    order_code: &str,
    status: OrderStatus,
    locale: Locale,
) -> NotificationText {
    let label = status_label(status, locale);
    match locale {
        Locale::En => NotificationText {
            title: "Order update".to_string(),
            body: format!("Your order {} is now: {}.", order_code, label),
        },
        Locale::Id => NotificationText {
            title: "Pembaruan pesanan".to_string(),
            body: format!("Status pesanan {} kini: {}.", order_code, label),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("id-ID,id;q=0.9,en;q=0.8", Some(Locale::Id))]
    #[test_case("en-US", Some(Locale::En))]
    #[test_case("fr-FR, ID", Some(Locale::Id))]
    #[test_case("de", None)]
    #[test_case("", None)]
    fn accept_language_parsing(header: &str, expected: Option<Locale>) {
        assert_eq!(Locale::from_accept_language(header), expected);
    }

    #[test]
    fn status_message_uses_localized_label() {
        let text = status_changed_notification("SO-1", OrderStatus::POD, Locale::Id);
        assert!(text.body.contains("Terkirim"));
        let text = status_changed_notification("SO-1", OrderStatus::POD, Locale::En);
        assert_eq!(text.body, "Your order SO-1 is now: Delivered.");
    }
}

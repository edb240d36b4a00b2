use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    carrier, delivery_order, party, shipment_document, shipment_document::DocumentType,
    shipment_tracking, tracking_event,
};
use crate::i18n::{self, Locale};

use super::delivery::CarrierView;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TrackingQuery {
    /// Waybill number, tracking number or order code
    pub code: Option<String>,
}

/// Staff-entered checkpoint on a shipment.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RecordTrackingEventRequest {
    #[validate(length(min = 1, max = 100, message = "status must be 1-100 characters"))]
    pub status: String,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Defaults to now
    pub event_date: Option<DateTime<Utc>>,
    pub proof_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AttachDocumentRequest {
    pub document_type: DocumentType,
    /// Path relative to the document storage root
    #[validate(length(min = 1, max = 500))]
    pub file_path: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShipmentView {
    pub id: Uuid,
    pub waybill_number: Option<String>,
    pub tracking_number: String,
    pub status: String,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

/// Customer as the public sees it: first name only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublicCustomer {
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SaleOrderRef {
    pub id: Uuid,
    pub order_code: String,
    pub order_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingEventView {
    pub id: Uuid,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub has_proof: bool,
}

impl From<&tracking_event::Model> for TrackingEventView {
    fn from(e: &tracking_event::Model) -> Self {
        Self {
            id: e.id,
            event_date: e.event_date,
            location: e.location.clone(),
            status: e.status.clone(),
            description: e.description.clone(),
            has_proof: e.proof_image.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub label: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentView {
    pub fn new(doc: &shipment_document::Model, locale: Locale) -> Self {
        Self {
            id: doc.id,
            document_type: doc.document_type,
            label: i18n::document_label(doc.document_type, locale).to_string(),
            notes: doc.notes.clone(),
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingPayload {
    pub shipment: ShipmentView,
    pub carrier: Option<CarrierView>,
    pub customer: Option<PublicCustomer>,
    pub sale_order: SaleOrderRef,
    pub events: Vec<TrackingEventView>,
    pub documents: Vec<DocumentView>,
    /// A waybill exists and can be printed
    pub can_print: bool,
}

impl TrackingPayload {
    /// Shapes a public tracking response. Events come out oldest first.
    pub fn build(
        tracking: &shipment_tracking::Model,
        carrier: Option<&carrier::Model>,
        order: &delivery_order::Model,
        customer: Option<&party::Model>,
        events: &[tracking_event::Model],
        documents: &[shipment_document::Model],
        locale: Locale,
    ) -> Self {
        let mut events: Vec<TrackingEventView> =
            events.iter().map(TrackingEventView::from).collect();
        events.sort_by_key(|e| e.event_date);

        Self {
            shipment: ShipmentView {
                id: tracking.id,
                waybill_number: tracking.waybill_number.clone(),
                tracking_number: tracking.tracking_number.clone(),
                status: tracking.status.clone(),
                estimated_delivery_date: tracking.estimated_delivery_date,
                actual_delivery_date: tracking.actual_delivery_date,
            },
            carrier: carrier.map(CarrierView::from),
            customer: customer.map(|c| PublicCustomer {
                first_name: c.first_name.clone(),
            }),
            sale_order: SaleOrderRef {
                id: order.id,
                order_code: order.order_code.clone(),
                order_date: order.order_date,
            },
            events,
            documents: documents
                .iter()
                .map(|d| DocumentView::new(d, locale))
                .collect(),
            can_print: tracking.waybill_number.is_some(),
        }
    }
}

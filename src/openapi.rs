use axum::Json;
use utoipa::OpenApi;

use crate::{dto, errors::ErrorResponse, handlers, ResponseMeta};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Delivery Tracking API",
        version = "0.1.0",
        description = r#"
Delivery orders, shipment tracking, delivery payments and customer notifications.

## Actors

Staff endpoints expect the gateway to forward the authenticated identity:

- `X-Actor-Id`: actor UUID
- `X-Actor-Type`: `staff` or `customer`
- `X-Actor-Role`: `admin`, `dispatcher` or `courier` (staff only)

## Public tracking

`GET /api/v1/public/tracking?code=...` accepts a waybill number, tracking number or order
code and is rate limited per client address.
"#
    ),
    paths(
        handlers::tracking::search_tracking,
        handlers::tracking::download_document,
        handlers::delivery_orders::create_order,
        handlers::delivery_orders::list_orders,
        handlers::delivery_orders::get_order,
        handlers::delivery_orders::update_order,
        handlers::delivery_orders::update_status,
        handlers::delivery_orders::record_payment,
        handlers::delivery_orders::assign_carrier,
        handlers::shipments::record_event,
        handlers::shipments::attach_document,
    ),
    components(schemas(
        ErrorResponse,
        ResponseMeta,
        dto::delivery::PaymentStatus,
        dto::delivery::DeliveryProof,
        dto::delivery::UpdateStatusRequest,
        dto::delivery::RecordPaymentRequest,
        dto::delivery::UpdateOrderRequest,
        dto::delivery::CreateOrderRequest,
        dto::delivery::CreateOrderLine,
        dto::delivery::AssignCarrierRequest,
        dto::delivery::OrderDetail,
        dto::delivery::OrderSummary,
        dto::delivery::PaymentReceipt,
        dto::delivery::StatusChangeView,
        dto::tracking::TrackingPayload,
        dto::tracking::RecordTrackingEventRequest,
        dto::tracking::AttachDocumentRequest,
    )),
    tags(
        (name = "tracking", description = "Public shipment tracking"),
        (name = "delivery-orders", description = "Delivery order workflow"),
        (name = "shipments", description = "Shipment checkpoints and documents")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use super::common::{created, AppJson};
use crate::{
    auth::Actor,
    dto::tracking::{
        AttachDocumentRequest, DocumentView, RecordTrackingEventRequest, TrackingEventView,
    },
    errors::ServiceError,
    i18n::Locale,
    ApiResponse, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/shipments/{tracking_id}/events",
    params(
        ("tracking_id" = Uuid, Path, description = "Shipment tracking ID")
    ),
    request_body = RecordTrackingEventRequest,
    responses(
        (status = 201, description = "Tracking event recorded", body = ApiResponse<TrackingEventView>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid event", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn record_event(
    State(state): State<AppState>,
    actor: Actor,
    Path(tracking_id): Path<Uuid>,
    AppJson(payload): AppJson<RecordTrackingEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TrackingEventView>>), ServiceError> {
    let event = state
        .shipment_service()
        .record_event(tracking_id, payload, &actor)
        .await?;
    Ok(created(TrackingEventView::from(&event)))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/{tracking_id}/documents",
    params(
        ("tracking_id" = Uuid, Path, description = "Shipment tracking ID")
    ),
    request_body = AttachDocumentRequest,
    responses(
        (status = 201, description = "Document attached", body = ApiResponse<DocumentView>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid document path", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn attach_document(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(tracking_id): Path<Uuid>,
    AppJson(payload): AppJson<AttachDocumentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentView>>), ServiceError> {
    let locale = Locale::from_headers(&headers, state.config.default_locale);
    let document = state
        .shipment_service()
        .attach_document(tracking_id, payload, &actor)
        .await?;
    Ok(created(DocumentView::new(&document, locale)))
}

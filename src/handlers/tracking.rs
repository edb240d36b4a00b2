use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::path::Path as FsPath;
use uuid::Uuid;

use crate::{
    dto::tracking::{TrackingPayload, TrackingQuery},
    errors::ServiceError,
    i18n::Locale,
    rate_limiter::extract_client_address,
    storage::content_type_for,
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/public/tracking",
    params(TrackingQuery),
    responses(
        (status = 200, description = "Shipment found", body = ApiResponse<TrackingPayload>),
        (status = 404, description = "No shipment matches the code", body = crate::errors::ErrorResponse),
        (status = 422, description = "Missing tracking code", body = crate::errors::ErrorResponse),
        (status = 429, description = "Too many searches from this address", body = crate::errors::ErrorResponse)
    ),
    tag = "tracking"
)]
pub async fn search_tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TrackingQuery>,
) -> ApiResult<TrackingPayload> {
    let client = extract_client_address(&headers);
    let locale = Locale::from_headers(&headers, state.config.default_locale);
    let payload = state
        .tracking_service()
        .search(&client, query.code.as_deref().unwrap_or_default(), locale)
        .await?;
    Ok(Json(ApiResponse::success(payload)))
}

#[utoipa::path(
    get,
    path = "/api/v1/public/tracking/documents/{id}",
    params(
        ("id" = Uuid, Path, description = "Shipment document ID")
    ),
    responses(
        (status = 200, description = "Document file", content_type = "application/octet-stream"),
        (status = 404, description = "Document or file not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Document storage unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "tracking"
)]
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let (document, bytes) = state.tracking_service().document(id).await?;

    let file_name = FsPath::new(&document.file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .replace('"', "");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&document.file_path)),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

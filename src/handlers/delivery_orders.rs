use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::{created, paginated, AppJson};
use crate::{
    auth::Actor,
    dto::delivery::{
        AssignCarrierRequest, CreateOrderRequest, OrderDetail, OrderListQuery, OrderSummary,
        PaymentReceipt, RecordPaymentRequest, StatusChangeView, TrackingSummary,
        UpdateOrderRequest, UpdateStatusRequest,
    },
    errors::ServiceError,
    services::delivery_orders::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    post,
    path = "/api/v1/delivery-orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Delivery order created", body = ApiResponse<OrderDetail>),
        (status = 401, description = "Missing actor headers", body = crate::errors::ErrorResponse),
        (status = 403, description = "Actor may not manage orders", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order code already in use", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid order", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    let service = state.delivery_order_service();
    let order = service.create_order(payload, &actor).await?;
    let detail = service.get_order(order.id, &actor).await?;
    Ok(created(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Delivery orders listed", body = ApiResponse<PaginatedResponse<OrderSummary>>),
        (status = 401, description = "Missing actor headers", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let (items, total) = state
        .delivery_order_service()
        .list_orders(query, &actor)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Delivery order ID")
    ),
    responses(
        (status = 200, description = "Delivery order fetched", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Order belongs to another customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.delivery_order_service().get_order(id, &actor).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/delivery-orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Delivery order ID")
    ),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Delivery order updated", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Total would fall below the paid amount", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid update", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateOrderRequest>,
) -> ApiResult<OrderDetail> {
    let service = state.delivery_order_service();
    service.update_order(id, payload, &actor).await?;
    let detail = service.get_order(id, &actor).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/delivery-orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Delivery order ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<StatusChangeView>),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed or lost to a concurrent change", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid target, missing proof or insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> ApiResult<StatusChangeView> {
    let outcome = state
        .delivery_status_service()
        .update_status(id, payload.into(), &actor)
        .await?;
    Ok(Json(ApiResponse::success(outcome.view())))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-orders/{id}/payments",
    params(
        ("id" = Uuid, Path, description = "Delivery order ID")
    ),
    request_body = RecordPaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PaymentReceipt>),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order no longer accepts payments", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid amount, payment type or proof", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn record_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ServiceError> {
    let receipt = state
        .delivery_payment_service()
        .record_payment(id, payload.into(), &actor)
        .await?;
    Ok(created(receipt))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-orders/{id}/carrier",
    params(
        ("id" = Uuid, Path, description = "Delivery order ID")
    ),
    request_body = AssignCarrierRequest,
    responses(
        (status = 200, description = "Carrier assigned", body = ApiResponse<TrackingSummary>),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order closed or waybill in use", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unknown or inactive carrier", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn assign_carrier(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<AssignCarrierRequest>,
) -> ApiResult<TrackingSummary> {
    let tracking = state
        .shipment_service()
        .assign_carrier(id, payload, &actor)
        .await?;
    Ok(Json(ApiResponse::success(TrackingSummary::from(&tracking))))
}

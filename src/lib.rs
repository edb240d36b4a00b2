//! Delivery Tracking Library
//!
//! Delivery order lifecycle with inventory side effects, delivery payments,
//! public shipment tracking and customer push notifications.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod i18n;
pub mod logging;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod storage;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    /// Present only when Redis is configured
    pub redis: Option<Arc<redis::Client>>,
}

impl AppState {
    pub fn delivery_order_service(&self) -> Arc<services::delivery_orders::DeliveryOrderService> {
        self.services.delivery_orders.clone()
    }

    pub fn delivery_status_service(&self) -> Arc<services::delivery_status::DeliveryStatusService> {
        self.services.delivery_status.clone()
    }

    pub fn delivery_payment_service(
        &self,
    ) -> Arc<services::delivery_payments::DeliveryPaymentService> {
        self.services.delivery_payments.clone()
    }

    pub fn shipment_service(&self) -> Arc<services::shipments::ShipmentService> {
        self.services.shipments.clone()
    }

    pub fn tracking_service(&self) -> Arc<services::tracking::TrackingLookupService> {
        self.services.tracking.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    // Public, unauthenticated
    let public = Router::new()
        .route(
            "/public/tracking",
            get(handlers::tracking::search_tracking),
        )
        .route(
            "/public/tracking/documents/:id",
            get(handlers::tracking::download_document),
        );

    // Staff and customer endpoints; the actor comes from gateway headers
    let delivery_orders = Router::new()
        .route(
            "/delivery-orders",
            get(handlers::delivery_orders::list_orders)
                .post(handlers::delivery_orders::create_order),
        )
        .route(
            "/delivery-orders/:id",
            get(handlers::delivery_orders::get_order).put(handlers::delivery_orders::update_order),
        )
        .route(
            "/delivery-orders/:id/status",
            put(handlers::delivery_orders::update_status),
        )
        .route(
            "/delivery-orders/:id/payments",
            post(handlers::delivery_orders::record_payment),
        )
        .route(
            "/delivery-orders/:id/carrier",
            post(handlers::delivery_orders::assign_carrier),
        );

    let shipments = Router::new()
        .route(
            "/shipments/:tracking_id/events",
            post(handlers::shipments::record_event),
        )
        .route(
            "/shipments/:tracking_id/documents",
            post(handlers::shipments::attach_document),
        );

    Router::new()
        .merge(public)
        .merge(delivery_orders)
        .merge(shipments)
}

/// Full application router with health, OpenAPI document and request tracing.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(TraceLayer::new_for_http())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let redis_status = match &state.redis {
        None => "not_configured",
        Some(client) => match client.get_async_connection().await {
            Ok(mut conn) => match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
                Ok(_) => "healthy",
                Err(_) => "unhealthy",
            },
            Err(_) => "unhealthy",
        },
    };

    let health_data = json!({
        "status": if db_status == "healthy" && redis_status != "unhealthy" { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
            "cache": redis_status,
        },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use delivery_tracking::{
    auth::{Actor, StaffRole, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ACTOR_TYPE_HEADER},
    config::AppConfig,
    db::{self, DbPool},
    dto::delivery::{AssignCarrierRequest, CreateOrderLine, CreateOrderRequest},
    entities::{carrier, delivery_order, party, payment_type, product, shipment_tracking},
    events::{Event, EventSender},
    handlers::AppServices,
    i18n::Locale,
    rate_limiter::{InMemoryCounterStore, ManualClock, RateLimitConfig, RateLimiter},
    storage::LocalDocumentStore,
    AppState,
};

/// Application state over a private in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub clock: Arc<ManualClock>,
    pub documents: TempDir,
    router: Router,
    events: mpsc::Receiver<Event>,
}

pub fn admin() -> Actor {
    Actor::staff(Uuid::new_v4(), StaffRole::Admin)
}

pub fn courier() -> Actor {
    Actor::staff(Uuid::new_v4(), StaffRole::Courier)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    // one connection keeps the in-memory database alive and shared
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_idle_timeout_secs = 3_600;
    cfg
}

pub async fn test_db() -> Arc<DbPool> {
    let pool = db::establish_connection_from_app_config(&test_config())
        .await
        .expect("failed to open test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");
    Arc::new(pool)
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::default()).await
    }

    pub async fn with_rate_limit(rl_cfg: RateLimitConfig) -> Self {
        let cfg = test_config();
        let db = test_db().await;

        let (event_tx, events) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
        let limiter = Arc::new(RateLimiter::new(rl_cfg, store));

        let documents = tempfile::tempdir().expect("tempdir");
        let services = AppServices::new(
            db.clone(),
            event_sender.clone(),
            limiter,
            Arc::new(LocalDocumentStore::new(documents.path())),
            Locale::En,
        );

        let state = AppState {
            db: db.clone(),
            config: cfg,
            event_sender,
            services,
            redis: None,
        };
        let router = delivery_tracking::app_router(state.clone());

        Self {
            state,
            db,
            clock,
            documents,
            router,
            events,
        }
    }

    /// Events published so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<&Actor>,
        extra_headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder
                .header(ACTOR_ID_HEADER, actor.id().to_string())
                .header(ACTOR_TYPE_HEADER, actor.kind());
            if let Actor::Staff { role, .. } = actor {
                builder = builder.header(ACTOR_ROLE_HEADER, role.to_string());
            }
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn raw_request(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router response")
    }

    pub async fn seed_customer(&self, active: bool, device_token: Option<&str>) -> party::Model {
        let now = Utc::now();
        party::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set("Siti".to_string()),
            last_name: Set(Some("Rahma".to_string())),
            email: Set(Some("siti@example.com".to_string())),
            phone: Set(Some("+62 811 000".to_string())),
            is_active: Set(active),
            device_token: Set(device_token.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed customer")
    }

    pub async fn seed_carrier(&self, name: &str) -> carrier::Model {
        carrier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed carrier")
    }

    pub async fn seed_payment_type(&self, name: &str, active: bool) -> payment_type::Model {
        payment_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            is_active: Set(active),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed payment type")
    }

    pub async fn seed_product(&self, sku: &str, stock: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("Product {}", sku)),
            stock: Set(stock),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed product")
    }

    /// Creates an order through the service. `lines` are `(product, quantity, unit_price)`.
    pub async fn create_order(
        &self,
        code: &str,
        party_id: Option<Uuid>,
        lines: &[(Uuid, Decimal, Decimal)],
        shipping_charge: Decimal,
    ) -> delivery_order::Model {
        let request = CreateOrderRequest {
            order_code: code.to_string(),
            order_date: None,
            party_id,
            shipping_charge: Some(shipping_charge),
            is_shipping_charge_distributed: false,
            note: None,
            items: lines
                .iter()
                .map(|(product_id, quantity, unit_price)| CreateOrderLine {
                    product_id: *product_id,
                    quantity: *quantity,
                    unit_price: *unit_price,
                    discount: None,
                    tax: None,
                    batch_number: None,
                    serial_number: None,
                })
                .collect(),
        };
        self.state
            .services
            .delivery_orders
            .create_order(request, &admin())
            .await
            .expect("create order")
    }

    pub async fn assign_carrier(
        &self,
        order_id: Uuid,
        carrier_id: Uuid,
        waybill: Option<&str>,
    ) -> shipment_tracking::Model {
        self.state
            .services
            .shipments
            .assign_carrier(
                order_id,
                AssignCarrierRequest {
                    carrier_id,
                    waybill_number: waybill.map(str::to_string),
                    estimated_delivery_date: None,
                    notes: None,
                },
                &admin(),
            )
            .await
            .expect("assign carrier")
    }

    pub async fn order(&self, order_id: Uuid) -> delivery_order::Model {
        delivery_order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await
            .expect("query order")
            .expect("order exists")
    }

    pub async fn product(&self, product_id: Uuid) -> product::Model {
        product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .expect("query product")
            .expect("product exists")
    }
}

//! Customer push notifications for delivery status changes.
//!
//! The dispatcher runs off the event channel, never inside a business
//! transaction. Every failure ends as a logged [`DispatchOutcome`].

use async_trait::async_trait;
use metrics::counter;
use sea_orm::{DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use slog::{info, warn, Logger};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{delivery_order, delivery_order::OrderStatus, party};
use crate::i18n::{self, Locale};

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Push provider rejected message with status {0}")]
    Rejected(u16),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Payload handed to the push provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Stable per event so provider-side retries collapse into one message
    pub idempotency_key: String,
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub order_id: Uuid,
    pub order_code: String,
    pub status: OrderStatus,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<(), NotificationError>;
}

/// Posts messages as JSON to a push provider endpoint.
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPushTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", &message.idempotency_key)
            .json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotificationError::Rejected(status.as_u16()))
        }
    }
}

/// Installed when no push endpoint is configured; logs and succeeds.
pub struct NoopPushTransport {
    logger: Logger,
}

impl NoopPushTransport {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PushTransport for NoopPushTransport {
    async fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        info!(self.logger, "push transport not configured, message not sent";
            "order_id" => %message.order_id,
            "idempotency_key" => &message.idempotency_key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OrderNotFound,
    NoCustomer,
    CustomerNotFound,
    CustomerInactive,
    NoDeviceToken,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OrderNotFound => "order_not_found",
            SkipReason::NoCustomer => "no_customer",
            SkipReason::CustomerNotFound => "customer_not_found",
            SkipReason::CustomerInactive => "customer_inactive",
            SkipReason::NoDeviceToken => "no_device_token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { attempts: u32 },
    Skipped(SkipReason),
    Failed { attempts: u32, error: String },
}

/// Builds the customer message for a status change.
pub fn compose(
    event_id: Uuid,
    order: &delivery_order::Model,
    device_token: &str,
    old_status: Option<OrderStatus>,
    new_status: OrderStatus,
    locale: Locale,
) -> PushMessage {
    let text = match old_status {
        None => i18n::new_order_notification(&order.order_code, locale),
        Some(_) => i18n::status_changed_notification(&order.order_code, new_status, locale),
    };
    PushMessage {
        idempotency_key: format!("delivery-status-{}", event_id),
        device_token: device_token.to_string(),
        title: text.title,
        body: text.body,
        order_id: order.id,
        order_code: order.order_code.clone(),
        status: new_status,
    }
}

pub struct NotificationDispatcher {
    db: Arc<DbPool>,
    transport: Arc<dyn PushTransport>,
    logger: Logger,
    locale: Locale,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<DbPool>, transport: Arc<dyn PushTransport>, logger: Logger) -> Self {
        Self {
            db,
            transport,
            logger,
            locale: Locale::default(),
            max_attempts: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Attempts are clamped to at least one. The wait before attempt `n + 1`
    /// is `backoff * n`.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    pub async fn dispatch_status_change(
        &self,
        event_id: Uuid,
        order_id: Uuid,
        old_status: Option<OrderStatus>,
        new_status: OrderStatus,
    ) -> DispatchOutcome {
        let outcome = match self.prepare(event_id, order_id, old_status, new_status).await {
            Ok(Ok(message)) => self.deliver(&message).await,
            Ok(Err(reason)) => DispatchOutcome::Skipped(reason),
            Err(e) => DispatchOutcome::Failed {
                attempts: 0,
                error: e.to_string(),
            },
        };
        self.record(order_id, new_status, &outcome);
        outcome
    }

    /// Applies the customer guards in order and composes the message.
    async fn prepare(
        &self,
        event_id: Uuid,
        order_id: Uuid,
        old_status: Option<OrderStatus>,
        new_status: OrderStatus,
    ) -> Result<Result<PushMessage, SkipReason>, NotificationError> {
        let Some(order) = delivery_order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(Err(SkipReason::OrderNotFound));
        };
        let Some(party_id) = order.party_id else {
            return Ok(Err(SkipReason::NoCustomer));
        };
        let Some(customer) = party::Entity::find_by_id(party_id)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(Err(SkipReason::CustomerNotFound));
        };
        if !customer.is_active {
            return Ok(Err(SkipReason::CustomerInactive));
        }
        let token = match customer.device_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Ok(Err(SkipReason::NoDeviceToken)),
        };

        Ok(Ok(compose(
            event_id, &order, &token, old_status, new_status, self.locale,
        )))
    }

    async fn deliver(&self, message: &PushMessage) -> DispatchOutcome {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.transport.send(message).await {
                Ok(()) => return DispatchOutcome::Sent { attempts: attempt },
                Err(e) => {
                    warn!(self.logger, "push delivery attempt failed";
                        "order_id" => %message.order_id,
                        "attempt" => attempt,
                        "error" => %e);
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }
        DispatchOutcome::Failed {
            attempts: self.max_attempts,
            error: last_error,
        }
    }

    fn record(&self, order_id: Uuid, status: OrderStatus, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent { attempts } => {
                counter!("delivery_notifications.sent", 1);
                info!(self.logger, "status notification sent";
                    "order_id" => %order_id, "status" => %status, "attempts" => attempts);
            }
            DispatchOutcome::Skipped(reason) => {
                counter!("delivery_notifications.skipped", 1);
                info!(self.logger, "status notification skipped";
                    "order_id" => %order_id, "status" => %status, "reason" => reason.as_str());
            }
            DispatchOutcome::Failed { attempts, error } => {
                counter!("delivery_notifications.failed", 1);
                warn!(self.logger, "status notification failed";
                    "order_id" => %order_id, "status" => %status,
                    "attempts" => attempts, "error" => error);
            }
        }
    }
}

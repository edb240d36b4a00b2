use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{self, Actor},
    db::DbPool,
    dto::delivery::{
        payment_status, DeliveryProof, PaymentReceipt, PaymentView, RecordPaymentRequest,
    },
    entities::{
        delivery_order::{self, OrderStatus},
        encode_photos, payment_transaction, payment_type,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_locks::OrderLocks,
};

const MAX_REFERENCE_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub amount: Decimal,
    pub payment_type_id: Uuid,
    pub reference_number: Option<String>,
    pub proof: DeliveryProof,
}

impl From<RecordPaymentRequest> for PaymentSubmission {
    fn from(request: RecordPaymentRequest) -> Self {
        Self {
            amount: request.amount,
            payment_type_id: request.payment_type_id,
            reference_number: request.reference_number,
            proof: request.proof,
        }
    }
}

impl PaymentSubmission {
    fn check(&self) -> Result<(), ServiceError> {
        if self.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be greater than zero".to_string(),
            ));
        }
        if let Some(reference) = &self.reference_number {
            if reference.chars().count() > MAX_REFERENCE_LENGTH {
                return Err(ServiceError::ValidationError(format!(
                    "reference number must be at most {} characters",
                    MAX_REFERENCE_LENGTH
                )));
            }
        }
        self.proof.check()
    }
}

/// Records cash and transfer payments collected against delivery orders.
#[derive(Clone)]
pub struct DeliveryPaymentService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    locks: OrderLocks,
}

impl DeliveryPaymentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, locks: OrderLocks) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
        }
    }

    /// Appends a payment and raises the order's paid amount in one transaction.
    /// Payments above the outstanding due are rejected.
    #[instrument(skip(self, submission, actor), fields(order_id = %order_id, amount = %submission.amount))]
    pub async fn record_payment(
        &self,
        order_id: Uuid,
        submission: PaymentSubmission,
        actor: &Actor,
    ) -> Result<PaymentReceipt, ServiceError> {
        auth::ensure_can_record_payment(actor)?;
        submission.check()?;

        let db = &*self.db_pool;
        let payment_type = payment_type::Entity::find_by_id(submission.payment_type_id)
            .one(db)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Payment type {} does not exist or is inactive",
                    submission.payment_type_id
                ))
            })?;

        let _guard = self.locks.acquire(order_id).await;
        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::db_error(e)
        })?;

        let order = delivery_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery order {} not found", order_id))
            })?;

        if matches!(order.order_status, OrderStatus::Cancelled | OrderStatus::Returned) {
            return Err(ServiceError::Conflict(format!(
                "Order {} is {} and no longer accepts payments",
                order.order_code, order.order_status
            )));
        }
        let due = order.due();
        if submission.amount > due {
            warn!(%order_id, amount = %submission.amount, %due, "payment exceeds due amount");
            return Err(ServiceError::ValidationError(format!(
                "Payment of {} exceeds the outstanding due of {}",
                submission.amount, due
            )));
        }

        let now = Utc::now();
        let proof = &submission.proof;
        let transaction = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            payment_type_id: Set(payment_type.id),
            amount: Set(submission.amount),
            reference_number: Set(submission
                .reference_number
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)),
            notes: Set(proof.notes()),
            transaction_date: Set(now),
            signature: Set(proof.signature()),
            photos: Set(encode_photos(&proof.photos)),
            latitude: Set(proof.latitude),
            longitude: Set(proof.longitude),
            created_by: Set(Some(actor.id())),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let paid_amount = order.paid_amount + submission.amount;
        let result = delivery_order::Entity::update_many()
            .set(delivery_order::ActiveModel {
                paid_amount: Set(paid_amount),
                version: Set(order.version + 1),
                updated_by: Set(Some(actor.id())),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(delivery_order::Column::Id.eq(order_id))
            .filter(delivery_order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit payment for order {}: {}", order_id, e);
            ServiceError::db_error(e)
        })?;

        let due_amount = order.grand_total - paid_amount;
        counter!("delivery_payments.recorded", 1);
        info!(%order_id, transaction_id = %transaction.id, %paid_amount, %due_amount, "delivery payment recorded");
        self.event_sender.send_or_log(Event::payment_recorded(
            order_id,
            transaction.id,
            submission.amount,
            due_amount,
        ));

        Ok(PaymentReceipt {
            transaction: PaymentView::new(&transaction, Some(payment_type.name)),
            paid_amount,
            due_amount,
            payment_status: payment_status(order.grand_total, paid_amount),
        })
    }
}

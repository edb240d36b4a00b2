use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{self, Actor},
    db::DbPool,
    dto::delivery::{DeliveryProof, StatusChangeView, UpdateStatusRequest},
    entities::{
        delivery_order::{self, InventoryStatus, OrderStatus},
        encode_photos, inventory_movement, order_status_history, shipment_tracking,
        tracking_event,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    i18n::{self, Locale},
    services::{
        inventory::{self, InventoryAction},
        order_locks::OrderLocks,
        shipments::latest_tracking,
    },
};

/// Statuses staff may move an order into through this workflow.
pub const ACCEPTED_TARGETS: &[OrderStatus] = &[
    OrderStatus::Delivery,
    OrderStatus::POD,
    OrderStatus::Returned,
    OrderStatus::Cancelled,
];

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: String,
    pub proof: DeliveryProof,
}

impl From<UpdateStatusRequest> for StatusUpdate {
    fn from(request: UpdateStatusRequest) -> Self {
        Self {
            status: request.status,
            proof: request.proof,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: delivery_order::Model,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub inventory_action: InventoryAction,
    pub movements: Vec<inventory_movement::Model>,
    pub history: order_status_history::Model,
    pub tracking_event: Option<tracking_event::Model>,
}

impl TransitionOutcome {
    pub fn view(&self) -> StatusChangeView {
        StatusChangeView {
            order_id: self.order.id,
            old_status: self.old_status,
            new_status: self.new_status,
            inventory_status: self.order.inventory_status,
            inventory_action: self.inventory_action.as_str().to_string(),
            history_id: self.history.id,
            version: self.order.version,
            changed_at: self.order.updated_at,
        }
    }
}

/// Parses and checks the request before any lock or transaction is taken.
fn validate_request(update: &StatusUpdate) -> Result<OrderStatus, ServiceError> {
    let target: OrderStatus = update
        .status
        .parse()
        .map_err(ServiceError::ValidationError)?;
    if !ACCEPTED_TARGETS.contains(&target) {
        return Err(ServiceError::ValidationError(format!(
            "Status {} cannot be set through the delivery workflow",
            target
        )));
    }

    update.proof.check()?;

    match target {
        OrderStatus::POD if !update.proof.has_evidence() => Err(ServiceError::ValidationError(
            "Proof of delivery needs a signature, a photo or notes".to_string(),
        )),
        OrderStatus::Returned | OrderStatus::Cancelled if !update.proof.has_notes() => {
            Err(ServiceError::ValidationError(format!(
                "A reason is required to mark an order {}",
                target
            )))
        }
        _ => Ok(target),
    }
}

/// Drives delivery orders through Delivery, POD, Returned and Cancelled,
/// moving stock and writing the audit trail in the same transaction.
#[derive(Clone)]
pub struct DeliveryStatusService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    locks: OrderLocks,
    label_locale: Locale,
}

impl DeliveryStatusService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, locks: OrderLocks) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
            label_locale: Locale::default(),
        }
    }

    /// Locale of the status label written onto tracking records.
    pub fn with_label_locale(mut self, locale: Locale) -> Self {
        self.label_locale = locale;
        self
    }

    #[instrument(skip(self, update, actor), fields(order_id = %order_id, target = %update.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ServiceError> {
        auth::ensure_staff(actor)?;
        let target = validate_request(&update)?;
        let proof = update.proof;

        let _guard = self.locks.acquire(order_id).await;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::db_error(e)
        })?;

        let order = delivery_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!("Delivery order {} not found", order_id);
                ServiceError::NotFound(format!("Delivery order {} not found", order_id))
            })?;

        let old_status = order.order_status;
        if old_status == target {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already {}",
                order.order_code, target
            )));
        }
        if !old_status.can_transition_to(target) {
            return Err(ServiceError::Conflict(format!(
                "Cannot move order {} from {} to {}",
                order.order_code, old_status, target
            )));
        }

        let tracking = latest_tracking(&txn, order_id).await?;
        if target == OrderStatus::Delivery && tracking.is_none() {
            return Err(ServiceError::Conflict(format!(
                "Order {} has no carrier assigned",
                order.order_code
            )));
        }

        let actor_id = Some(actor.id());
        let (inventory_action, inventory_status, movements) =
            match (target, order.inventory_status) {
                (OrderStatus::POD, InventoryStatus::Pending) => (
                    InventoryAction::Deducted,
                    InventoryStatus::Added,
                    inventory::deduct_for_order(&txn, order_id, actor_id).await?,
                ),
                // only POD may move to Returned, so Cancelled never sees added stock
                (OrderStatus::Returned, InventoryStatus::Added) => (
                    InventoryAction::Restored,
                    InventoryStatus::Removed,
                    inventory::restore_for_order(&txn, order_id, actor_id).await?,
                ),
                (_, current) => (InventoryAction::None, current, Vec::new()),
            };

        let now = Utc::now();
        let signature = if target == OrderStatus::POD {
            proof.signature().or_else(|| order.signature.clone())
        } else {
            order.signature.clone()
        };

        let result = delivery_order::Entity::update_many()
            .set(delivery_order::ActiveModel {
                order_status: Set(target),
                inventory_status: Set(inventory_status),
                signature: Set(signature.clone()),
                version: Set(order.version + 1),
                updated_by: Set(actor_id),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(delivery_order::Column::Id.eq(order_id))
            .filter(delivery_order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            warn!(%order_id, version = order.version, "order changed during status transition");
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            old_status: Set(Some(old_status)),
            new_status: Set(target),
            actor_id: Set(actor_id),
            actor_kind: Set(actor.kind().to_string()),
            notes: Set(proof.notes()),
            signature: Set(proof.signature()),
            proof_image: Set(proof.proof_image()),
            photos: Set(encode_photos(&proof.photos)),
            latitude: Set(proof.latitude),
            longitude: Set(proof.longitude),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let tracking_event = match tracking {
            Some(tracking) => Some(
                self.advance_tracking(&txn, tracking, target, &proof, now)
                    .await?,
            ),
            None => None,
        };

        txn.commit().await.map_err(|e| {
            error!("Failed to commit status change for order {}: {}", order_id, e);
            ServiceError::db_error(e)
        })?;

        counter!("delivery_status.transitions", 1);
        info!(
            %order_id,
            from = %old_status,
            to = %target,
            inventory = inventory_action.as_str(),
            "delivery order status updated"
        );
        self.event_sender
            .send_or_log(Event::status_changed(order_id, Some(old_status), target));

        let order = delivery_order::Model {
            order_status: target,
            inventory_status,
            signature,
            version: order.version + 1,
            updated_by: actor_id,
            updated_at: now,
            ..order
        };

        Ok(TransitionOutcome {
            order,
            old_status,
            new_status: target,
            inventory_action,
            movements,
            history,
            tracking_event,
        })
    }

    async fn advance_tracking<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        tracking: shipment_tracking::Model,
        target: OrderStatus,
        proof: &DeliveryProof,
        now: DateTime<Utc>,
    ) -> Result<tracking_event::Model, ServiceError> {
        let label = i18n::status_label(target, self.label_locale).to_string();
        let event = tracking_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_id: Set(tracking.id),
            event_date: Set(now),
            location: Set(None),
            status: Set(label.clone()),
            description: Set(proof.notes()),
            proof_image: Set(proof.proof_image().or_else(|| proof.signature())),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        let mut active: shipment_tracking::ActiveModel = tracking.into();
        active.status = Set(label);
        if target == OrderStatus::POD {
            active.actual_delivery_date = Set(Some(now));
        }
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn update(status: &str, proof: DeliveryProof) -> StatusUpdate {
        StatusUpdate {
            status: status.to_string(),
            proof,
        }
    }

    #[test_case("Pending" ; "pending")]
    #[test_case("Processing" ; "processing")]
    #[test_case("Shipped" ; "unknown")]
    fn rejects_targets_outside_workflow(status: &str) {
        assert_matches!(
            validate_request(&update(status, DeliveryProof::default())),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn pod_requires_evidence() {
        assert_matches!(
            validate_request(&update("POD", DeliveryProof::default())),
            Err(ServiceError::ValidationError(_))
        );
        let signed = DeliveryProof {
            signature: Some("sig".into()),
            ..Default::default()
        };
        assert_eq!(validate_request(&update("pod", signed)).unwrap(), OrderStatus::POD);
    }

    #[test_case("Returned")]
    #[test_case("Cancelled")]
    fn reversals_require_a_reason(status: &str) {
        let blank = DeliveryProof {
            notes: Some("   ".into()),
            ..Default::default()
        };
        assert_matches!(
            validate_request(&update(status, blank)),
            Err(ServiceError::ValidationError(_))
        );
        let reason = DeliveryProof {
            notes: Some("customer refused".into()),
            ..Default::default()
        };
        assert!(validate_request(&update(status, reason)).is_ok());
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let proof = DeliveryProof {
            latitude: Some(95.0),
            longitude: Some(10.0),
            ..Default::default()
        };
        assert_matches!(
            validate_request(&update("Delivery", proof)),
            Err(ServiceError::ValidationError(_))
        );
    }
}

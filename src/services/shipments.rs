use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{self, Actor},
    db::DbPool,
    dto::{
        delivery::AssignCarrierRequest,
        tracking::{AttachDocumentRequest, RecordTrackingEventRequest},
    },
    entities::{carrier, delivery_order, shipment_document, shipment_tracking, tracking_event},
    errors::ServiceError,
    services::order_locks::OrderLocks,
    storage,
};

const CARRIER_ASSIGNED_LABEL: &str = "Carrier assigned";

/// The order's most recent tracking record.
pub async fn latest_tracking<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Option<shipment_tracking::Model>, ServiceError> {
    let records = shipment_tracking::Entity::find()
        .filter(shipment_tracking::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;
    Ok(records.into_iter().max_by_key(|t| t.created_at))
}

fn generate_tracking_number() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TRK-{}", &raw[..12])
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Carrier assignment and shipment checkpoints.
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    locks: OrderLocks,
}

impl ShipmentService {
    pub fn new(db_pool: Arc<DbPool>, locks: OrderLocks) -> Self {
        Self { db_pool, locks }
    }

    /// Assigns a carrier, creating the tracking record on first assignment
    /// and updating it afterwards.
    #[instrument(skip(self, request, actor), fields(order_id = %order_id, carrier_id = %request.carrier_id))]
    pub async fn assign_carrier(
        &self,
        order_id: Uuid,
        request: AssignCarrierRequest,
        actor: &Actor,
    ) -> Result<shipment_tracking::Model, ServiceError> {
        auth::ensure_can_manage_orders(actor)?;
        request.validate()?;

        let db = &*self.db_pool;
        let carrier = carrier::Entity::find_by_id(request.carrier_id)
            .one(db)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Carrier {} does not exist or is inactive",
                    request.carrier_id
                ))
            })?;
        let waybill = trimmed(request.waybill_number);

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
        if order.order_status.is_terminal()
            || order.order_status == delivery_order::OrderStatus::POD
        {
            return Err(ServiceError::Conflict(format!(
                "Cannot assign a carrier to an order in status {}",
                order.order_status
            )));
        }

        let existing = latest_tracking(&txn, order_id).await?;

        if let Some(waybill) = &waybill {
            let taken = shipment_tracking::Entity::find()
                .filter(shipment_tracking::Column::WaybillNumber.eq(waybill.as_str()))
                .one(&txn)
                .await?;
            if let Some(other) = taken {
                if existing.as_ref().map(|t| t.id) != Some(other.id) {
                    return Err(ServiceError::Conflict(format!(
                        "Waybill {} is already in use",
                        waybill
                    )));
                }
            }
        }

        let now = Utc::now();
        let tracking = match existing {
            Some(current) => {
                let mut active: shipment_tracking::ActiveModel = current.into();
                active.carrier_id = Set(carrier.id);
                if waybill.is_some() {
                    active.waybill_number = Set(waybill);
                }
                if request.estimated_delivery_date.is_some() {
                    active.estimated_delivery_date = Set(request.estimated_delivery_date);
                }
                if let Some(notes) = trimmed(request.notes) {
                    active.notes = Set(Some(notes));
                }
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                shipment_tracking::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    carrier_id: Set(carrier.id),
                    waybill_number: Set(waybill),
                    tracking_number: Set(generate_tracking_number()),
                    status: Set(CARRIER_ASSIGNED_LABEL.to_string()),
                    estimated_delivery_date: Set(request.estimated_delivery_date),
                    actual_delivery_date: Set(None),
                    notes: Set(trimmed(request.notes)),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let updated = delivery_order::Entity::update_many()
            .set(delivery_order::ActiveModel {
                carrier_id: Set(Some(carrier.id)),
                version: Set(order.version + 1),
                updated_by: Set(Some(actor.id())),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(delivery_order::Column::Id.eq(order_id))
            .filter(delivery_order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit carrier assignment for order {}: {}", order_id, e);
            ServiceError::db_error(e)
        })?;

        counter!("delivery_shipments.carrier_assigned", 1);
        info!(
            %order_id,
            tracking_number = %tracking.tracking_number,
            carrier = %carrier.name,
            "carrier assigned"
        );
        Ok(tracking)
    }

    /// Appends a checkpoint and mirrors its status onto the tracking record.
    #[instrument(skip(self, request, actor), fields(tracking_id = %tracking_id))]
    pub async fn record_event(
        &self,
        tracking_id: Uuid,
        request: RecordTrackingEventRequest,
        actor: &Actor,
    ) -> Result<tracking_event::Model, ServiceError> {
        auth::ensure_staff(actor)?;
        request.validate()?;
        let status = request.status.trim().to_string();
        if status.is_empty() {
            return Err(ServiceError::ValidationError(
                "status must not be blank".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let tracking = find_tracking(db, tracking_id).await?;
        let _guard = self.locks.acquire(tracking.order_id).await;

        let txn = db.begin().await?;
        let now = Utc::now();
        let event = tracking_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_id: Set(tracking_id),
            event_date: Set(request.event_date.unwrap_or(now)),
            location: Set(trimmed(request.location)),
            status: Set(status.clone()),
            description: Set(trimmed(request.description)),
            proof_image: Set(trimmed(request.proof_image)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut active: shipment_tracking::ActiveModel = tracking.into();
        active.status = Set(status);
        active.updated_at = Set(now);
        active.update(&txn).await?;
        txn.commit().await?;

        counter!("delivery_shipments.events_recorded", 1);
        info!(%tracking_id, event_id = %event.id, "tracking event recorded");
        Ok(event)
    }

    #[instrument(skip(self, request, actor), fields(tracking_id = %tracking_id))]
    pub async fn attach_document(
        &self,
        tracking_id: Uuid,
        request: AttachDocumentRequest,
        actor: &Actor,
    ) -> Result<shipment_document::Model, ServiceError> {
        auth::ensure_staff(actor)?;
        request.validate()?;
        let path = storage::validate_relative_path(&request.file_path).map_err(|_| {
            ServiceError::ValidationError(format!(
                "file_path {} must be relative to the document root",
                request.file_path
            ))
        })?;

        let db = &*self.db_pool;
        find_tracking(db, tracking_id).await?;

        let document = shipment_document::ActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_id: Set(tracking_id),
            document_type: Set(request.document_type),
            file_path: Set(path.to_string_lossy().into_owned()),
            notes: Set(trimmed(request.notes)),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(%tracking_id, document_id = %document.id, document_type = %document.document_type,
            "shipment document attached");
        Ok(document)
    }
}

async fn find_tracking(
    db: &DbPool,
    tracking_id: Uuid,
) -> Result<shipment_tracking::Model, ServiceError> {
    shipment_tracking::Entity::find_by_id(tracking_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", tracking_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_numbers_are_prefixed_and_unique() {
        let a = generate_tracking_number();
        let b = generate_tracking_number();
        assert!(a.starts_with("TRK-"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn blank_values_collapse_to_none() {
        assert_eq!(trimmed(Some("   ".into())), None);
        assert_eq!(trimmed(Some(" WB1 ".into())), Some("WB1".to_string()));
    }
}

use metrics::counter;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::tracking::TrackingPayload,
    entities::{
        carrier, delivery_order, party, shipment_document, shipment_tracking, tracking_event,
    },
    errors::ServiceError,
    i18n::Locale,
    rate_limiter::{tracking_search_key, RateLimiter},
    services::shipments::latest_tracking,
    storage::DocumentStore,
};

/// Which identifier a search code matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Waybill,
    TrackingNumber,
    OrderCode,
}

/// Public, unauthenticated shipment lookups.
#[derive(Clone)]
pub struct TrackingLookupService {
    db_pool: Arc<DbPool>,
    limiter: Arc<RateLimiter>,
    documents: Arc<dyn DocumentStore>,
}

impl TrackingLookupService {
    pub fn new(
        db_pool: Arc<DbPool>,
        limiter: Arc<RateLimiter>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            db_pool,
            limiter,
            documents,
        }
    }

    /// Looks a shipment up by waybill, tracking number or order code, in that
    /// order. Every attempt counts against the caller's search window, valid
    /// or not.
    #[instrument(skip(self), fields(client = %client_key))]
    pub async fn search(
        &self,
        client_key: &str,
        code: &str,
        locale: Locale,
    ) -> Result<TrackingPayload, ServiceError> {
        let result = self
            .limiter
            .check_rate_limit(&tracking_search_key(client_key))
            .await;
        if !result.allowed {
            warn!(client = %client_key, "tracking search rate limited");
            return Err(ServiceError::RateLimitExceeded);
        }

        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "A tracking code is required".to_string(),
            ));
        }

        let (tracking, matched_by) = self
            .resolve(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No shipment found for {}", code)))?;
        debug!(tracking_id = %tracking.id, ?matched_by, "tracking code resolved");

        let db = &*self.db_pool;
        let order = delivery_order::Entity::find_by_id(tracking.order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order for shipment {} not found", tracking.id))
            })?;
        let carrier = carrier::Entity::find_by_id(tracking.carrier_id).one(db).await?;
        let customer = match order.party_id {
            Some(id) => party::Entity::find_by_id(id).one(db).await?,
            None => None,
        };
        let events = tracking_event::Entity::find()
            .filter(tracking_event::Column::TrackingId.eq(tracking.id))
            .all(db)
            .await?;
        let mut documents = shipment_document::Entity::find()
            .filter(shipment_document::Column::TrackingId.eq(tracking.id))
            .all(db)
            .await?;
        documents.sort_by_key(|d| d.created_at);

        counter!("delivery_tracking.searches", 1);
        Ok(TrackingPayload::build(
            &tracking,
            carrier.as_ref(),
            &order,
            customer.as_ref(),
            &events,
            &documents,
            locale,
        ))
    }

    /// First match wins: waybill, then tracking number, then the newest
    /// tracking record of the order with that code.
    pub async fn resolve(
        &self,
        code: &str,
    ) -> Result<Option<(shipment_tracking::Model, MatchedBy)>, ServiceError> {
        let db = &*self.db_pool;

        if let Some(tracking) = shipment_tracking::Entity::find()
            .filter(shipment_tracking::Column::WaybillNumber.eq(code))
            .one(db)
            .await?
        {
            return Ok(Some((tracking, MatchedBy::Waybill)));
        }

        if let Some(tracking) = shipment_tracking::Entity::find()
            .filter(shipment_tracking::Column::TrackingNumber.eq(code))
            .one(db)
            .await?
        {
            return Ok(Some((tracking, MatchedBy::TrackingNumber)));
        }

        let Some(order) = delivery_order::Entity::find()
            .filter(delivery_order::Column::OrderCode.eq(code))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        Ok(latest_tracking(db, order.id)
            .await?
            .map(|t| (t, MatchedBy::OrderCode)))
    }

    /// Document metadata plus file contents.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn document(
        &self,
        document_id: Uuid,
    ) -> Result<(shipment_document::Model, Vec<u8>), ServiceError> {
        let document = shipment_document::Entity::find_by_id(document_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Document {} not found", document_id)))?;

        let bytes = self.documents.read(&document.file_path).await?;
        info!(%document_id, size = bytes.len(), "shipment document served");
        Ok((document, bytes))
    }
}

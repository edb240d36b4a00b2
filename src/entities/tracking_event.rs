use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only shipment checkpoint
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracking_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub proof_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment_tracking::Entity",
        from = "Column::TrackingId",
        to = "super::shipment_tracking::Column::Id"
    )]
    ShipmentTracking,
}

impl Related<super::shipment_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentTracking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

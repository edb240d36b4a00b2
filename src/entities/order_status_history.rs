use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery_order::OrderStatus;

/// Audit trail row written for every order status change
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_status_histories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    /// None for the row written when the order is created
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor_id: Option<Uuid>,
    pub actor_kind: String,
    pub notes: Option<String>,
    pub signature: Option<String>,
    pub proof_image: Option<String>,
    pub photos: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

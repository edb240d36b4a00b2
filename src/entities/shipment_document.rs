use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[sea_orm(string_value = "waybill")]
    Waybill,
    #[sea_orm(string_value = "invoice")]
    Invoice,
    #[sea_orm(string_value = "proof_of_delivery")]
    ProofOfDelivery,
    #[sea_orm(string_value = "photo")]
    Photo,
    #[sea_orm(string_value = "other")]
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Waybill => write!(f, "waybill"),
            DocumentType::Invoice => write!(f, "invoice"),
            DocumentType::ProofOfDelivery => write!(f, "proof_of_delivery"),
            DocumentType::Photo => write!(f, "photo"),
            DocumentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waybill" => Ok(DocumentType::Waybill),
            "invoice" => Ok(DocumentType::Invoice),
            "proof_of_delivery" | "pod" => Ok(DocumentType::ProofOfDelivery),
            "photo" => Ok(DocumentType::Photo),
            "other" => Ok(DocumentType::Other),
            _ => Err(format!("Unknown document type: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub document_type: DocumentType,
    /// Path relative to the document storage root
    pub file_path: String,
    pub notes: Option<String>,
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

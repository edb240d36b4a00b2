use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a delivery order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Processing")]
    Processing,
    #[sea_orm(string_value = "Delivery")]
    Delivery,
    #[sea_orm(string_value = "POD")]
    POD,
    #[sea_orm(string_value = "Returned")]
    Returned,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Statuses this one may move to. Returned and Cancelled are terminal.
    /// Cancelled is unreachable from POD, so deducted stock only comes back
    /// through Returned.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending | OrderStatus::Processing => {
                &[OrderStatus::Delivery, OrderStatus::Cancelled]
            }
            OrderStatus::Delivery => &[
                OrderStatus::POD,
                OrderStatus::Returned,
                OrderStatus::Cancelled,
            ],
            OrderStatus::POD => &[OrderStatus::Returned],
            OrderStatus::Returned | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Delivery => write!(f, "Delivery"),
            OrderStatus::POD => write!(f, "POD"),
            OrderStatus::Returned => write!(f, "Returned"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "delivery" => Ok(OrderStatus::Delivery),
            "pod" => Ok(OrderStatus::POD),
            "returned" => Ok(OrderStatus::Returned),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Whether the order's lines have been taken out of (or put back into) stock
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "added")]
    Added,
    #[sea_orm(string_value = "removed")]
    Removed,
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryStatus::Pending => write!(f, "pending"),
            InventoryStatus::Added => write!(f, "added"),
            InventoryStatus::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_code: String,
    pub order_date: DateTime<Utc>,
    pub party_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub order_status: OrderStatus,
    pub inventory_status: InventoryStatus,
    pub shipping_charge: Decimal,
    pub is_shipping_charge_distributed: bool,
    pub note: Option<String>,
    pub signature: Option<String>,
    pub version: i32,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Outstanding amount; never stored.
    pub fn due(&self) -> Decimal {
        self.grand_total - self.paid_amount
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::item_transaction::Entity")]
    ItemTransactions,
    #[sea_orm(has_many = "super::shipment_tracking::Entity")]
    ShipmentTrackings,
    #[sea_orm(has_many = "super::payment_transaction::Entity")]
    PaymentTransactions,
}

impl Related<super::item_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemTransactions.def()
    }
}

impl Related<super::shipment_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentTrackings.def()
    }
}

impl Related<super::payment_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OrderStatus::Pending, OrderStatus::Delivery, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::POD, false)]
    #[test_case(OrderStatus::Processing, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Delivery, OrderStatus::POD, true)]
    #[test_case(OrderStatus::Delivery, OrderStatus::Returned, true)]
    #[test_case(OrderStatus::POD, OrderStatus::Returned, true)]
    #[test_case(OrderStatus::POD, OrderStatus::Cancelled, false)]
    #[test_case(OrderStatus::Returned, OrderStatus::Delivery, false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Delivery, false)]
    #[test_case(OrderStatus::Delivery, OrderStatus::Delivery, false)]
    fn transition_table(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn parses_status_case_insensitively() {
        assert_eq!("pod".parse::<OrderStatus>(), Ok(OrderStatus::POD));
        assert_eq!("Canceled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}

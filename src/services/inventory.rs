//! Stock adjustments tied to delivery outcomes.
//!
//! These run inside the caller's transaction; they never commit.

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{
    inventory_movement, inventory_movement::MovementType, item_transaction, product,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    None,
    Deducted,
    Restored,
}

impl InventoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryAction::None => "none",
            InventoryAction::Deducted => "deducted",
            InventoryAction::Restored => "restored",
        }
    }
}

async fn order_lines<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<item_transaction::Model>, ServiceError> {
    let mut lines = item_transaction::Entity::find()
        .filter(item_transaction::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;
    lines.sort_by_key(|l| (l.created_at, l.id));
    Ok(lines)
}

/// Takes every line's quantity out of its product's stock.
///
/// Stock is checked per product against the summed quantity first, so a
/// shortfall leaves every product untouched.
pub async fn deduct_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    actor_id: Option<Uuid>,
) -> Result<Vec<inventory_movement::Model>, ServiceError> {
    let lines = order_lines(conn, order_id).await?;

    let mut required: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for line in &lines {
        *required.entry(line.product_id).or_default() += line.quantity;
    }

    for (product_id, quantity) in &required {
        let product = product::Entity::find_by_id(*product_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::InsufficientStock(format!("Product {} no longer exists", product_id))
            })?;
        if product.stock < *quantity {
            warn!(%order_id, sku = %product.sku, stock = %product.stock, required = %quantity,
                "insufficient stock for delivery");
            return Err(ServiceError::InsufficientStock(format!(
                "Product {} has {} in stock, {} required",
                product.sku, product.stock, quantity
            )));
        }
    }

    let mut movements = Vec::with_capacity(lines.len());
    for line in &lines {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(line.product_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Stock for product {} changed during delivery",
                line.product_id
            )));
        }
        movements.push(
            record_movement(
                conn,
                order_id,
                line,
                -line.quantity,
                MovementType::DeliveryDeduction,
                actor_id,
            )
            .await?,
        );
    }

    counter!("delivery_inventory.deductions", 1);
    info!(%order_id, lines = lines.len(), "inventory deducted for delivered order");
    Ok(movements)
}

/// Puts every line's quantity back into stock.
pub async fn restore_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    actor_id: Option<Uuid>,
) -> Result<Vec<inventory_movement::Model>, ServiceError> {
    let lines = order_lines(conn, order_id).await?;

    let mut movements = Vec::with_capacity(lines.len());
    for line in &lines {
        product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(line.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(line.product_id))
            .exec(conn)
            .await?;
        movements.push(
            record_movement(
                conn,
                order_id,
                line,
                line.quantity,
                MovementType::DeliveryRestoration,
                actor_id,
            )
            .await?,
        );
    }

    counter!("delivery_inventory.restorations", 1);
    info!(%order_id, lines = lines.len(), "inventory restored for returned order");
    Ok(movements)
}

async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    line: &item_transaction::Model,
    quantity: Decimal,
    movement_type: MovementType,
    actor_id: Option<Uuid>,
) -> Result<inventory_movement::Model, ServiceError> {
    let movement = inventory_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(line.product_id),
        item_transaction_id: Set(line.id),
        quantity: Set(quantity),
        movement_type: Set(movement_type),
        actor_id: Set(actor_id),
        created_at: Set(Utc::now()),
    };
    Ok(movement.insert(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!(InventoryAction::None.as_str(), "none");
        assert_eq!(InventoryAction::Deducted.as_str(), "deducted");
        assert_eq!(InventoryAction::Restored.as_str(), "restored");
    }
}

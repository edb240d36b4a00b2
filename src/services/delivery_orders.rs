use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{self, Actor},
    db::DbPool,
    dto::delivery::{
        CreateOrderLine, CreateOrderRequest, OrderDetail, OrderDetailParts, OrderListQuery,
        OrderSummary, PaymentView, UpdateOrderRequest,
    },
    entities::{
        carrier,
        delivery_order::{self, InventoryStatus, OrderStatus},
        item_transaction, order_status_history, party, payment_transaction, payment_type, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{order_locks::OrderLocks, shipments::latest_tracking},
};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("amount out of range".to_string())
}

/// `quantity * unit_price - discount + tax`
pub fn line_total(line: &CreateOrderLine) -> Result<Decimal, ServiceError> {
    line.quantity
        .checked_mul(line.unit_price)
        .and_then(|amount| amount.checked_sub(line.discount.unwrap_or_default()))
        .and_then(|amount| amount.checked_add(line.tax.unwrap_or_default()))
        .ok_or_else(out_of_range)
}

/// Subtotal of the lines plus the shipping charge.
pub fn order_total(
    line_totals: impl IntoIterator<Item = Decimal>,
    shipping_charge: Decimal,
) -> Result<Decimal, ServiceError> {
    line_totals
        .into_iter()
        .try_fold(shipping_charge, |acc, total| acc.checked_add(total))
        .ok_or_else(out_of_range)
}

fn check_line(index: usize, line: &CreateOrderLine) -> Result<(), ServiceError> {
    line.validate()?;
    if line.quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "items[{}]: quantity must be greater than zero",
            index
        )));
    }
    let negative = [Some(line.unit_price), line.discount, line.tax]
        .into_iter()
        .flatten()
        .any(|v| v < Decimal::ZERO);
    if negative {
        return Err(ServiceError::ValidationError(format!(
            "items[{}]: prices, discounts and taxes must not be negative",
            index
        )));
    }
    if line_total(line)? < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "items[{}]: discount exceeds the line amount",
            index
        )));
    }
    Ok(())
}

fn check_shipping_charge(charge: Option<Decimal>) -> Result<(), ServiceError> {
    match charge {
        Some(c) if c < Decimal::ZERO => Err(ServiceError::ValidationError(
            "shipping_charge must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Creation, editing and read projections of delivery orders.
#[derive(Clone)]
pub struct DeliveryOrderService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    locks: OrderLocks,
}

impl DeliveryOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, locks: OrderLocks) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
        }
    }

    /// Creates a pending order with its lines and the first history row.
    #[instrument(skip(self, request, actor), fields(order_code = %request.order_code))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        actor: &Actor,
    ) -> Result<delivery_order::Model, ServiceError> {
        auth::ensure_can_manage_orders(actor)?;
        request.validate()?;
        check_shipping_charge(request.shipping_charge)?;
        for (index, line) in request.items.iter().enumerate() {
            check_line(index, line)?;
        }
        let order_code = request.order_code.trim().to_string();
        if order_code.is_empty() {
            return Err(ServiceError::ValidationError(
                "order code must not be blank".to_string(),
            ));
        }

        let db = &*self.db_pool;
        if let Some(party_id) = request.party_id {
            if party::Entity::find_by_id(party_id).one(db).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Customer {} does not exist",
                    party_id
                )));
            }
        }
        let product_ids: HashSet<Uuid> = request.items.iter().map(|l| l.product_id).collect();
        let known = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids.iter().copied()))
            .all(db)
            .await?;
        if let Some(missing) = product_ids
            .iter()
            .find(|id| !known.iter().any(|p| p.id == **id))
        {
            return Err(ServiceError::ValidationError(format!(
                "Product {} does not exist",
                missing
            )));
        }

        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::db_error(e)
        })?;

        let duplicate = delivery_order::Entity::find()
            .filter(delivery_order::Column::OrderCode.eq(order_code.as_str()))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Order code {} is already in use",
                order_code
            )));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let shipping_charge = request.shipping_charge.unwrap_or_default();
        let line_totals = request
            .items
            .iter()
            .map(line_total)
            .collect::<Result<Vec<_>, _>>()?;
        let grand_total = order_total(line_totals.iter().copied(), shipping_charge)?;

        let order = delivery_order::ActiveModel {
            id: Set(order_id),
            order_code: Set(order_code),
            order_date: Set(request.order_date.unwrap_or(now)),
            party_id: Set(request.party_id),
            carrier_id: Set(None),
            grand_total: Set(grand_total),
            paid_amount: Set(Decimal::ZERO),
            order_status: Set(OrderStatus::Pending),
            inventory_status: Set(InventoryStatus::Pending),
            shipping_charge: Set(shipping_charge),
            is_shipping_charge_distributed: Set(request.is_shipping_charge_distributed),
            note: Set(request.note.clone()),
            signature: Set(None),
            version: Set(1),
            created_by: Set(Some(actor.id())),
            updated_by: Set(Some(actor.id())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (line, total) in request.items.iter().zip(line_totals) {
            item_transaction::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                discount: Set(line.discount.unwrap_or_default()),
                tax: Set(line.tax.unwrap_or_default()),
                total: Set(total),
                batch_number: Set(line.batch_number.clone()),
                serial_number: Set(line.serial_number.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            old_status: Set(None),
            new_status: Set(OrderStatus::Pending),
            actor_id: Set(Some(actor.id())),
            actor_kind: Set(actor.kind().to_string()),
            notes: Set(None),
            signature: Set(None),
            proof_image: Set(None),
            photos: Set(None),
            latitude: Set(None),
            longitude: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit new order: {}", e);
            ServiceError::db_error(e)
        })?;

        counter!("delivery_orders.created", 1);
        info!(%order_id, order_code = %order.order_code, grand_total = %order.grand_total, "delivery order created");
        self.event_sender
            .send_or_log(Event::status_changed(order_id, None, OrderStatus::Pending));
        Ok(order)
    }

    /// Edits the note and shipping charge. The grand total is recomputed and
    /// may not fall below what has already been paid.
    #[instrument(skip(self, request, actor), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
        actor: &Actor,
    ) -> Result<delivery_order::Model, ServiceError> {
        auth::ensure_can_manage_orders(actor)?;
        request.validate()?;
        check_shipping_charge(request.shipping_charge)?;

        let _guard = self.locks.acquire(order_id).await;
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = delivery_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery order {} not found", order_id))
            })?;

        let lines = item_transaction::Entity::find()
            .filter(item_transaction::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        let shipping_charge = request.shipping_charge.unwrap_or(order.shipping_charge);
        let grand_total = order_total(lines.iter().map(|l| l.total), shipping_charge)?;
        if grand_total < order.paid_amount {
            return Err(ServiceError::Conflict(format!(
                "New total {} is below the {} already paid",
                grand_total, order.paid_amount
            )));
        }

        let now = Utc::now();
        let updated = delivery_order::Model {
            note: request.note.or_else(|| order.note.clone()),
            shipping_charge,
            is_shipping_charge_distributed: request
                .is_shipping_charge_distributed
                .unwrap_or(order.is_shipping_charge_distributed),
            grand_total,
            version: order.version + 1,
            updated_by: Some(actor.id()),
            updated_at: now,
            ..order.clone()
        };

        let result = delivery_order::Entity::update_many()
            .set(delivery_order::ActiveModel {
                note: Set(updated.note.clone()),
                shipping_charge: Set(updated.shipping_charge),
                is_shipping_charge_distributed: Set(updated.is_shipping_charge_distributed),
                grand_total: Set(updated.grand_total),
                version: Set(updated.version),
                updated_by: Set(updated.updated_by),
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
        txn.commit().await?;

        info!(%order_id, %grand_total, "delivery order updated");
        Ok(updated)
    }

    /// Full staff view of one order. Customers only see their own.
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = delivery_order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery order {} not found", order_id))
            })?;
        auth::ensure_can_view_order(actor, order.party_id)?;

        let customer = match order.party_id {
            Some(id) => party::Entity::find_by_id(id).one(db).await?,
            None => None,
        };
        let tracking = latest_tracking(db, order_id).await?;
        let carrier_id = tracking.as_ref().map(|t| t.carrier_id).or(order.carrier_id);
        let carrier = match carrier_id {
            Some(id) => carrier::Entity::find_by_id(id).one(db).await?,
            None => None,
        };

        let mut lines = item_transaction::Entity::find()
            .filter(item_transaction::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        lines.sort_by_key(|l| (l.created_at, l.id));
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(lines.iter().map(|l| l.product_id)))
            .all(db)
            .await?;

        let mut payments = payment_transaction::Entity::find()
            .filter(payment_transaction::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        payments.sort_by_key(|p| p.transaction_date);
        let type_names: HashMap<Uuid, String> = payment_type::Entity::find()
            .filter(payment_type::Column::Id.is_in(payments.iter().map(|p| p.payment_type_id)))
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let payments = payments
            .iter()
            .map(|p| PaymentView::new(p, type_names.get(&p.payment_type_id).cloned()))
            .collect();

        let history = order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(OrderDetail::build(OrderDetailParts {
            order: &order,
            customer: customer.as_ref(),
            carrier: carrier.as_ref(),
            tracking: tracking.as_ref(),
            lines: &lines,
            products: &products,
            payments,
            history: &history,
        }))
    }

    /// Newest first. Customers get their own orders only.
    #[instrument(skip(self, actor))]
    pub async fn list_orders(
        &self,
        query: OrderListQuery,
        actor: &Actor,
    ) -> Result<(Vec<OrderSummary>, u64), ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut select = delivery_order::Entity::find();
        if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status: OrderStatus = status.parse().map_err(ServiceError::ValidationError)?;
            select = select.filter(delivery_order::Column::OrderStatus.eq(status));
        }
        if let Actor::Customer { id } = actor {
            select = select.filter(delivery_order::Column::PartyId.eq(*id));
        }

        let db = &*self.db_pool;
        let paginator = select
            .order_by_desc(delivery_order::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!("Failed to count delivery orders: {}", e);
            ServiceError::db_error(e)
        })?;
        let orders = paginator.fetch_page(page - 1).await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut item_counts: HashMap<Uuid, u64> = HashMap::new();
        for line in item_transaction::Entity::find()
            .filter(item_transaction::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?
        {
            *item_counts.entry(line.order_id).or_default() += 1;
        }
        let names: HashMap<Uuid, String> = party::Entity::find()
            .filter(party::Column::Id.is_in(orders.iter().filter_map(|o| o.party_id)))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.full_name()))
            .collect();

        let summaries = orders
            .iter()
            .map(|o| {
                OrderSummary::new(
                    o,
                    o.party_id.and_then(|id| names.get(&id).cloned()),
                    item_counts.get(&o.id).copied().unwrap_or(0),
                )
            })
            .collect();
        Ok((summaries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal) -> CreateOrderLine {
        CreateOrderLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
            discount: None,
            tax: None,
            batch_number: None,
            serial_number: None,
        }
    }

    #[test]
    fn line_total_applies_discount_and_tax() {
        let mut l = line(dec!(3), dec!(10));
        l.discount = Some(dec!(5));
        l.tax = Some(dec!(2.5));
        assert_eq!(line_total(&l).unwrap(), dec!(27.5));
    }

    #[test]
    fn oversized_amounts_are_rejected_instead_of_overflowing() {
        assert_matches!(
            line_total(&line(Decimal::MAX, dec!(2))),
            Err(ServiceError::ValidationError(msg)) if msg == "amount out of range"
        );
        assert_matches!(
            order_total([dec!(10)], Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(order_total([dec!(10), dec!(20)], dec!(5)).unwrap(), dec!(35));
    }

    #[test]
    fn rejects_non_positive_quantity_and_negative_prices() {
        assert_matches!(
            check_line(0, &line(dec!(0), dec!(1))),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_line(0, &line(dec!(1), dec!(-1))),
            Err(ServiceError::ValidationError(_))
        );
        let mut over = line(dec!(1), dec!(10));
        over.discount = Some(dec!(11));
        assert_matches!(check_line(0, &over), Err(ServiceError::ValidationError(_)));
        assert!(check_line(0, &line(dec!(2), dec!(0))).is_ok());
    }

    #[test]
    fn negative_shipping_charge_is_invalid() {
        assert!(check_shipping_charge(None).is_ok());
        assert!(check_shipping_charge(Some(dec!(0))).is_ok());
        assert_matches!(
            check_shipping_charge(Some(dec!(-1))),
            Err(ServiceError::ValidationError(_))
        );
    }
}

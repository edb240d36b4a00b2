use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    carrier, delivery_order,
    delivery_order::{InventoryStatus, OrderStatus},
    item_transaction, order_status_history, party, payment_transaction, product,
    shipment_tracking,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    PartiallyPaid,
}

/// Derived on read, never stored. Zero due wins over zero paid.
pub fn payment_status(grand_total: Decimal, paid_amount: Decimal) -> PaymentStatus {
    let due = grand_total - paid_amount;
    if due.is_zero() {
        PaymentStatus::Paid
    } else if paid_amount.is_zero() {
        PaymentStatus::Unpaid
    } else {
        PaymentStatus::PartiallyPaid
    }
}

/// Evidence attached to a status change or a payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryProof {
    /// Free-text notes; the reason for returns and cancellations
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
    /// Encoded signature image or reference
    pub signature: Option<String>,
    /// Photo references
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 photos may be attached"))]
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DeliveryProof {
    /// Length limits plus geolocation bounds; latitude and longitude come as a pair.
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(ServiceError::ValidationError(format!(
                        "latitude {} is outside [-90, 90]",
                        lat
                    )));
                }
                if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                    return Err(ServiceError::ValidationError(format!(
                        "longitude {} is outside [-180, 180]",
                        lon
                    )));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            _ => Err(ServiceError::ValidationError(
                "latitude and longitude must be supplied together".to_string(),
            )),
        }
    }

    pub fn has_notes(&self) -> bool {
        non_blank(self.notes.as_deref()).is_some()
    }

    /// Signature, photo or notes.
    pub fn has_evidence(&self) -> bool {
        non_blank(self.signature.as_deref()).is_some()
            || self.photos.iter().any(|p| !p.trim().is_empty())
            || self.has_notes()
    }

    pub fn notes(&self) -> Option<String> {
        non_blank(self.notes.as_deref()).map(str::to_string)
    }

    pub fn signature(&self) -> Option<String> {
        non_blank(self.signature.as_deref()).map(str::to_string)
    }

    /// First photo doubles as the proof image on history and tracking rows.
    pub fn proof_image(&self) -> Option<String> {
        self.photos.iter().find(|p| !p.trim().is_empty()).cloned()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// Target status: Delivery, POD, Returned or Cancelled
    #[schema(example = "POD")]
    pub status: String,
    #[serde(flatten)]
    pub proof: DeliveryProof,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RecordPaymentRequest {
    #[schema(value_type = String, example = "40")]
    pub amount: Decimal,
    pub payment_type_id: Uuid,
    #[validate(length(max = 100, message = "reference number must be at most 100 characters"))]
    pub reference_number: Option<String>,
    #[serde(flatten)]
    pub proof: DeliveryProof,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(max = 1000, message = "note must be at most 1000 characters"))]
    pub note: Option<String>,
    #[schema(value_type = Option<String>, example = "15")]
    pub shipping_charge: Option<Decimal>,
    pub is_shipping_charge_distributed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateOrderLine {
    pub product_id: Uuid,
    #[schema(value_type = String, example = "2")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "25")]
    pub unit_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub tax: Option<Decimal>,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50, message = "order code must be 1-50 characters"))]
    #[schema(example = "SO-2024-0001")]
    pub order_code: String,
    pub order_date: Option<DateTime<Utc>>,
    pub party_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub shipping_charge: Option<Decimal>,
    #[serde(default)]
    pub is_shipping_charge_distributed: bool,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "an order needs at least one line"))]
    pub items: Vec<CreateOrderLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AssignCarrierRequest {
    pub carrier_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub waybill_number: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub shipping_charge: Decimal,
    #[schema(value_type = String)]
    pub grand_total: Decimal,
    #[schema(value_type = String)]
    pub paid_amount: Decimal,
    #[schema(value_type = String)]
    pub due: Decimal,
}

/// Customer as staff see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
}

impl From<&party::Model> for CustomerView {
    fn from(p: &party::Model) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            full_name: p.full_name(),
            email: p.email.clone(),
            phone: p.phone.clone(),
            is_active: p.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CarrierView {
    pub id: Uuid,
    pub name: String,
}

impl From<&carrier::Model> for CarrierView {
    fn from(c: &carrier::Model) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: Option<String>,
    pub product_name: Option<String>,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub batch_number: Option<String>,
    pub serial_number: Option<String>,
    /// Portion of the shipping charge carried by this line when distributed
    #[schema(value_type = Option<String>)]
    pub shipping_share: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentView {
    pub id: Uuid,
    pub payment_type_id: Uuid,
    pub payment_type_name: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub has_signature: bool,
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_by: Option<Uuid>,
}

impl PaymentView {
    pub fn new(tx: &payment_transaction::Model, payment_type_name: Option<String>) -> Self {
        Self {
            id: tx.id,
            payment_type_id: tx.payment_type_id,
            payment_type_name,
            amount: tx.amount,
            reference_number: tx.reference_number.clone(),
            notes: tx.notes.clone(),
            transaction_date: tx.transaction_date,
            has_signature: tx.signature.is_some(),
            photos: tx.photo_list(),
            latitude: tx.latitude,
            longitude: tx.longitude,
            created_by: tx.created_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentReceipt {
    pub transaction: PaymentView,
    #[schema(value_type = String)]
    pub paid_amount: Decimal,
    #[schema(value_type = String)]
    pub due_amount: Decimal,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryView {
    pub id: Uuid,
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor_id: Option<Uuid>,
    pub actor_kind: String,
    pub notes: Option<String>,
    pub proof_image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<&order_status_history::Model> for StatusHistoryView {
    fn from(h: &order_status_history::Model) -> Self {
        Self {
            id: h.id,
            old_status: h.old_status,
            new_status: h.new_status,
            actor_id: h.actor_id,
            actor_kind: h.actor_kind.clone(),
            notes: h.notes.clone(),
            proof_image: h.proof_image.clone(),
            latitude: h.latitude,
            longitude: h.longitude,
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingSummary {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub waybill_number: Option<String>,
    pub tracking_number: String,
    pub status: String,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

impl From<&shipment_tracking::Model> for TrackingSummary {
    fn from(t: &shipment_tracking::Model) -> Self {
        Self {
            id: t.id,
            carrier_id: t.carrier_id,
            waybill_number: t.waybill_number.clone(),
            tracking_number: t.tracking_number.clone(),
            status: t.status.clone(),
            estimated_delivery_date: t.estimated_delivery_date,
            actual_delivery_date: t.actual_delivery_date,
        }
    }
}

/// Full staff view of a delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_code: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub inventory_status: InventoryStatus,
    pub is_shipping_charge_distributed: bool,
    pub note: Option<String>,
    pub has_signature: bool,
    pub version: i32,
    pub customer: Option<CustomerView>,
    pub carrier: Option<CarrierView>,
    pub tracking: Option<TrackingSummary>,
    pub items: Vec<OrderLineView>,
    pub payments: Vec<PaymentView>,
    pub history: Vec<StatusHistoryView>,
    pub totals: OrderTotals,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything [`OrderDetail::build`] needs, already loaded.
pub struct OrderDetailParts<'a> {
    pub order: &'a delivery_order::Model,
    pub customer: Option<&'a party::Model>,
    pub carrier: Option<&'a carrier::Model>,
    pub tracking: Option<&'a shipment_tracking::Model>,
    pub lines: &'a [item_transaction::Model],
    pub products: &'a [product::Model],
    pub payments: Vec<PaymentView>,
    pub history: &'a [order_status_history::Model],
}

impl OrderDetail {
    pub fn build(parts: OrderDetailParts<'_>) -> Self {
        let order = parts.order;
        let shares = if order.is_shipping_charge_distributed {
            shipping_shares(order.shipping_charge, parts.lines)
        } else {
            vec![None; parts.lines.len()]
        };

        let items = parts
            .lines
            .iter()
            .zip(shares)
            .map(|(line, share)| {
                let product = parts.products.iter().find(|p| p.id == line.product_id);
                OrderLineView {
                    id: line.id,
                    product_id: line.product_id,
                    sku: product.map(|p| p.sku.clone()),
                    product_name: product.map(|p| p.name.clone()),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    discount: line.discount,
                    tax: line.tax,
                    total: line.total,
                    batch_number: line.batch_number.clone(),
                    serial_number: line.serial_number.clone(),
                    shipping_share: share,
                }
            })
            .collect();

        let subtotal: Decimal = parts.lines.iter().map(|l| l.total).sum();
        let mut history: Vec<StatusHistoryView> =
            parts.history.iter().map(StatusHistoryView::from).collect();
        history.sort_by_key(|h| h.created_at);

        Self {
            id: order.id,
            order_code: order.order_code.clone(),
            order_date: order.order_date,
            order_status: order.order_status,
            inventory_status: order.inventory_status,
            is_shipping_charge_distributed: order.is_shipping_charge_distributed,
            note: order.note.clone(),
            has_signature: order.signature.is_some(),
            version: order.version,
            customer: parts.customer.map(CustomerView::from),
            carrier: parts.carrier.map(CarrierView::from),
            tracking: parts.tracking.map(TrackingSummary::from),
            items,
            payments: parts.payments,
            history,
            totals: OrderTotals {
                subtotal,
                shipping_charge: order.shipping_charge,
                grand_total: order.grand_total,
                paid_amount: order.paid_amount,
                due: order.due(),
            },
            payment_status: payment_status(order.grand_total, order.paid_amount),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Splits the shipping charge across lines in proportion to line totals,
/// equally when every total is zero. The last line absorbs rounding so the
/// shares add up to the charge exactly.
pub fn shipping_shares(charge: Decimal, lines: &[item_transaction::Model]) -> Vec<Option<Decimal>> {
    if lines.is_empty() {
        return Vec::new();
    }
    let base: Decimal = lines.iter().map(|l| l.total).sum();
    let count = Decimal::from(lines.len() as u64);
    let mut allocated = Decimal::ZERO;
    let last = lines.len() - 1;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let share = if i == last {
                charge - allocated
            } else if base.is_zero() {
                (charge / count).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            } else {
                (charge * (line.total / base))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            };
            allocated += share;
            Some(share)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_code: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub inventory_status: InventoryStatus,
    pub party_id: Option<Uuid>,
    pub customer_name: Option<String>,
    #[schema(value_type = String)]
    pub grand_total: Decimal,
    #[schema(value_type = String)]
    pub paid_amount: Decimal,
    #[schema(value_type = String)]
    pub due: Decimal,
    pub payment_status: PaymentStatus,
    pub item_count: u64,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn new(
        order: &delivery_order::Model,
        customer_name: Option<String>,
        item_count: u64,
    ) -> Self {
        Self {
            id: order.id,
            order_code: order.order_code.clone(),
            order_date: order.order_date,
            order_status: order.order_status,
            inventory_status: order.inventory_status,
            party_id: order.party_id,
            customer_name,
            grand_total: order.grand_total,
            paid_amount: order.paid_amount,
            due: order.due(),
            payment_status: payment_status(order.grand_total, order.paid_amount),
            item_count,
            created_at: order.created_at,
        }
    }
}

/// Result of a status transition as returned over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusChangeView {
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub inventory_status: InventoryStatus,
    /// "deducted", "restored" or "none"
    pub inventory_action: String,
    pub history_id: Uuid,
    pub version: i32,
    pub changed_at: DateTime<Utc>,
}

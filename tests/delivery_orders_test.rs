mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{admin, courier, TestApp};
use delivery_tracking::{
    auth::{Actor, StaffRole},
    dto::delivery::{
        CreateOrderLine, CreateOrderRequest, DeliveryProof, OrderListQuery, UpdateOrderRequest,
    },
    entities::delivery_order::OrderStatus,
    errors::ServiceError,
    services::delivery_payments::PaymentSubmission,
};

fn request(code: &str, product_id: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        order_code: code.to_string(),
        order_date: None,
        party_id: None,
        shipping_charge: Some(dec!(5)),
        is_shipping_charge_distributed: false,
        note: Some("leave at the gate".to_string()),
        items: vec![CreateOrderLine {
            product_id,
            quantity: dec!(3),
            unit_price: dec!(10),
            discount: Some(dec!(5)),
            tax: Some(dec!(2.5)),
            batch_number: None,
            serial_number: None,
        }],
    }
}

#[tokio::test]
async fn grand_total_is_lines_plus_shipping() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O1", dec!(10)).await;

    let order = app
        .state
        .services
        .delivery_orders
        .create_order(request("SO-O1", product.id), &admin())
        .await
        .unwrap();

    // 3 * 10 - 5 + 2.5 = 27.5, plus 5 shipping
    assert_eq!(order.grand_total, dec!(32.5));
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.version, 1);

    let detail = app
        .state
        .services
        .delivery_orders
        .get_order(order.id, &courier())
        .await
        .unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.totals.subtotal, dec!(27.5));
    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].old_status, None);
}

#[tokio::test]
async fn duplicate_order_codes_conflict() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O2", dec!(10)).await;
    let service = &app.state.services.delivery_orders;

    service
        .create_order(request("SO-O2", product.id), &admin())
        .await
        .unwrap();
    let err = service
        .create_order(request("SO-O2", product.id), &admin())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn unknown_products_and_customers_are_rejected() {
    let app = TestApp::new().await;
    let service = &app.state.services.delivery_orders;

    let err = service
        .create_order(request("SO-O3", Uuid::new_v4()), &admin())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let product = app.seed_product("SKU-O3", dec!(10)).await;
    let mut with_ghost = request("SO-O3", product.id);
    with_ghost.party_id = Some(Uuid::new_v4());
    let err = service.create_order(with_ghost, &admin()).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn only_admins_and_dispatchers_create_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O4", dec!(10)).await;
    let service = &app.state.services.delivery_orders;

    let err = service
        .create_order(request("SO-O4", product.id), &courier())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let dispatcher = Actor::staff(Uuid::new_v4(), StaffRole::Dispatcher);
    assert!(service
        .create_order(request("SO-O4", product.id), &dispatcher)
        .await
        .is_ok());
}

#[tokio::test]
async fn shipping_cannot_drop_total_below_paid() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O5", dec!(10)).await;
    let order = app
        .create_order("SO-O5", None, &[(product.id, dec!(1), dec!(20))], dec!(30))
        .await;
    let cash = app.seed_payment_type("Cash", true).await;
    app.state
        .services
        .delivery_payments
        .record_payment(
            order.id,
            PaymentSubmission {
                amount: dec!(45),
                payment_type_id: cash.id,
                reference_number: None,
                proof: DeliveryProof::default(),
            },
            &courier(),
        )
        .await
        .unwrap();

    let service = &app.state.services.delivery_orders;
    let err = service
        .update_order(
            order.id,
            UpdateOrderRequest {
                shipping_charge: Some(dec!(10)),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let updated = service
        .update_order(
            order.id,
            UpdateOrderRequest {
                shipping_charge: Some(dec!(25)),
                is_shipping_charge_distributed: Some(true),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(updated.grand_total, dec!(45));
    assert_eq!(app.order(order.id).await.grand_total, dec!(45));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_on_create() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O7", dec!(10)).await;
    let service = &app.state.services.delivery_orders;

    let mut huge_line = request("SO-O7A", product.id);
    huge_line.items[0].quantity = Decimal::MAX;
    huge_line.items[0].unit_price = dec!(2);
    huge_line.items[0].discount = None;
    huge_line.items[0].tax = None;
    let err = service.create_order(huge_line, &admin()).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg == "amount out of range");

    let mut huge_shipping = request("SO-O7B", product.id);
    huge_shipping.shipping_charge = Some(Decimal::MAX);
    let err = service
        .create_order(huge_shipping, &admin())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let (_, total) = service
        .list_orders(OrderListQuery::default(), &admin())
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn oversized_shipping_is_rejected_on_update() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O8", dec!(10)).await;
    let order = app
        .create_order("SO-O8", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;

    let err = app
        .state
        .services
        .delivery_orders
        .update_order(
            order.id,
            UpdateOrderRequest {
                shipping_charge: Some(Decimal::MAX),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg == "amount out of range");

    let unchanged = app.order(order.id).await;
    assert_eq!(unchanged.grand_total, dec!(10));
    assert_eq!(unchanged.version, order.version);
}

#[tokio::test]
async fn distributed_shipping_is_shared_across_lines() {
    let app = TestApp::new().await;
    let a = app.seed_product("SKU-O6A", dec!(10)).await;
    let b = app.seed_product("SKU-O6B", dec!(10)).await;
    let order = app
        .create_order(
            "SO-O6",
            None,
            &[(a.id, dec!(1), dec!(30)), (b.id, dec!(1), dec!(10))],
            dec!(8),
        )
        .await;
    app.state
        .services
        .delivery_orders
        .update_order(
            order.id,
            UpdateOrderRequest {
                is_shipping_charge_distributed: Some(true),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap();

    let detail = app
        .state
        .services
        .delivery_orders
        .get_order(order.id, &admin())
        .await
        .unwrap();
    let shares: Decimal = detail
        .items
        .iter()
        .filter_map(|line| line.shipping_share)
        .sum();
    assert_eq!(shares, dec!(8));
    assert_eq!(detail.totals.grand_total, dec!(48));
}

#[tokio::test]
async fn customers_see_only_their_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O7", dec!(10)).await;
    let owner = app.seed_customer(true, None).await;
    let stranger = app.seed_customer(true, None).await;
    let order = app
        .create_order("SO-O7", Some(owner.id), &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let service = &app.state.services.delivery_orders;

    assert!(service
        .get_order(order.id, &Actor::customer(owner.id))
        .await
        .is_ok());
    let err = service
        .get_order(order.id, &Actor::customer(stranger.id))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let (items, total) = service
        .list_orders(OrderListQuery::default(), &Actor::customer(stranger.id))
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn listing_filters_by_status_and_pages() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-O8", dec!(10)).await;
    for i in 0..3 {
        app.create_order(&format!("SO-O8-{}", i), None, &[(product.id, dec!(1), dec!(10))], dec!(0))
            .await;
    }
    let service = &app.state.services.delivery_orders;

    let (items, total) = service
        .list_orders(
            OrderListQuery {
                status: None,
                page: Some(2),
                limit: Some(2),
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 1);

    let (items, total) = service
        .list_orders(
            OrderListQuery {
                status: Some("POD".to_string()),
                page: None,
                limit: None,
            },
            &admin(),
        )
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);

    let err = service
        .list_orders(
            OrderListQuery {
                status: Some("lost".to_string()),
                page: None,
                limit: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

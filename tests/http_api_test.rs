mod common;

use axum::http::{header, Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{admin, courier, TestApp};
use delivery_tracking::auth::Actor;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

#[tokio::test]
async fn health_reports_database_and_missing_cache() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["checks"]["database"], "healthy");
    assert_eq!(body["data"]["checks"]["cache"], "not_configured");
}

#[tokio::test]
async fn request_id_is_echoed_on_responses() {
    let app = TestApp::new().await;

    let (_, body) = app
        .request(
            Method::GET,
            "/api/v1/public/tracking?code=NOPE",
            None,
            None,
            &[("x-request-id", "trace-42")],
        )
        .await;

    assert_eq!(body["code"], "not_found");
    assert_eq!(body["request_id"], "trace-42");
}

#[tokio::test]
async fn order_endpoints_require_an_actor() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/delivery-orders", None, None, &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/delivery-orders",
            None,
            None,
            &[("x-actor-id", "not-a-uuid"), ("x-actor-type", "staff")],
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn couriers_cannot_create_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-H0", dec!(5)).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/delivery-orders",
            Some(json!({
                "order_code": "SO-H0",
                "items": [{ "product_id": product.id, "quantity": "1", "unit_price": "10" }]
            })),
            Some(&courier()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_delivery_flow_over_http() {
    let app = TestApp::new().await;
    let admin = admin();
    let courier = courier();
    let customer = app.seed_customer(true, None).await;
    let product = app.seed_product("SKU-H1", dec!(10)).await;
    let carrier = app.seed_carrier("JNE").await;
    let cash = app.seed_payment_type("Cash", true).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/delivery-orders",
            Some(json!({
                "order_code": "SO-H1",
                "party_id": customer.id,
                "shipping_charge": "10",
                "items": [{ "product_id": product.id, "quantity": "3", "unit_price": "30" }]
            })),
            Some(&admin),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["order_status"], "Pending");
    assert_eq!(decimal(&body["data"]["totals"]["grand_total"]), dec!(100));
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/delivery-orders/{}/carrier", order_id),
            Some(json!({ "carrier_id": carrier.id, "waybill_number": "WB-HTTP-1" })),
            Some(&admin),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["waybill_number"], "WB-HTTP-1");

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/delivery-orders/{}/status", order_id),
            Some(json!({ "status": "Delivery" })),
            Some(&courier),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["old_status"], "Pending");
    assert_eq!(body["data"]["new_status"], "Delivery");
    assert_eq!(body["data"]["inventory_action"], "none");

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/delivery-orders/{}/status", order_id),
            Some(json!({
                "status": "POD",
                "signature": "sig",
                "latitude": -6.2,
                "longitude": 106.8
            })),
            Some(&courier),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["inventory_action"], "deducted");
    assert_eq!(body["data"]["inventory_status"], "added");
    assert_eq!(app.product(product.id).await.stock, dec!(7));

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/delivery-orders/{}/payments", order_id),
            Some(json!({ "amount": "40", "payment_type_id": cash.id })),
            Some(&courier),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(decimal(&body["data"]["due_amount"]), dec!(60));
    assert_eq!(body["data"]["payment_status"], "partially_paid");

    // the customer sees their own order, with the full history
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/delivery-orders/{}", order_id),
            None,
            Some(&Actor::customer(customer.id)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["order_status"], "POD");
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["payments"].as_array().unwrap().len(), 1);

    // and the public lookup shows the shipment without customer details
    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/public/tracking?code=WB-HTTP-1",
            None,
            None,
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["sale_order"]["order_code"], "SO-H1");
    assert_eq!(body["data"]["customer"]["first_name"], "Siti");
    assert!(body["data"]["customer"].get("email").is_none());
    assert_eq!(body["data"]["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["can_print"], true);
}

#[tokio::test]
async fn invalid_status_payload_is_unprocessable() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-H2", dec!(5)).await;
    let order = app
        .create_order("SO-H2", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/delivery-orders/{}/status", order.id),
            Some(json!({ "status": "Teleported" })),
            Some(&courier()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/delivery-orders/{}/status", order.id),
            Some(json!({ "state": "POD" })),
            Some(&courier()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/delivery-orders/{}", Uuid::new_v4()),
            None,
            Some(&admin()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn customers_only_list_their_own_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-H3", dec!(5)).await;
    let mine = app.seed_customer(true, None).await;
    let other = app.seed_customer(true, None).await;
    app.create_order("SO-H3A", Some(mine.id), &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    app.create_order("SO-H3B", Some(other.id), &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/delivery-orders?page=1&limit=10",
            None,
            Some(&Actor::customer(mine.id)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["order_code"], "SO-H3A");

    let (_, body) = app
        .request(
            Method::GET,
            "/api/v1/delivery-orders?status=pending",
            None,
            Some(&admin()),
            &[],
        )
        .await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn document_download_sets_attachment_headers() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-H4", dec!(5)).await;
    let carrier = app.seed_carrier("JNE").await;
    let order = app
        .create_order("SO-H4", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let tracking = app.assign_carrier(order.id, carrier.id, Some("WB-H4")).await;
    std::fs::write(app.documents.path().join("invoice-h4.pdf"), b"%PDF").unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/documents", tracking.id),
            Some(json!({ "document_type": "invoice", "file_path": "invoice-h4.pdf" })),
            Some(&admin()),
            &[("accept-language", "id-ID")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["label"], "Faktur");
    let document_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .raw_request(&format!("/api/v1/public/tracking/documents/{}", document_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"invoice-h4.pdf\""
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/api-docs/openapi.json", None, None, &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/public/tracking"].is_object());
}

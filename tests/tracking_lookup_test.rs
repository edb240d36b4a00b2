mod common;

use assert_matches::assert_matches;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::time::Duration;

use common::{admin, courier, TestApp};
use delivery_tracking::{
    dto::tracking::{AttachDocumentRequest, RecordTrackingEventRequest},
    entities::shipment_document::DocumentType,
    errors::ServiceError,
    i18n::Locale,
    rate_limiter::RateLimitConfig,
    services::tracking::MatchedBy,
};

const CLIENT: &str = "203.0.113.7";

fn checkpoint(status: &str, hours_ago: i64) -> RecordTrackingEventRequest {
    RecordTrackingEventRequest {
        status: status.to_string(),
        location: Some("Jakarta hub".to_string()),
        description: None,
        event_date: Some(Utc::now() - ChronoDuration::hours(hours_ago)),
        proof_image: None,
    }
}

#[tokio::test]
async fn waybill_search_returns_events_oldest_first() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(true, None).await;
    let carrier = app.seed_carrier("JNE").await;
    let product = app.seed_product("SKU-T1", dec!(10)).await;
    let order = app
        .create_order("SO-T1", Some(customer.id), &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let tracking = app.assign_carrier(order.id, carrier.id, Some("WB123")).await;

    let shipments = &app.state.services.shipments;
    shipments
        .record_event(tracking.id, checkpoint("Out for delivery", 1), &courier())
        .await
        .unwrap();
    shipments
        .record_event(tracking.id, checkpoint("Picked up", 5), &courier())
        .await
        .unwrap();

    let payload = app
        .state
        .services
        .tracking
        .search(CLIENT, "WB123", Locale::En)
        .await
        .expect("tracking found");

    assert_eq!(payload.shipment.id, tracking.id);
    assert_eq!(payload.shipment.waybill_number.as_deref(), Some("WB123"));
    assert_eq!(payload.shipment.status, "Out for delivery");
    assert_eq!(payload.sale_order.order_code, "SO-T1");
    assert_eq!(payload.carrier.as_ref().map(|c| c.name.as_str()), Some("JNE"));
    assert_eq!(payload.customer.as_ref().map(|c| c.first_name.as_str()), Some("Siti"));
    assert!(payload.can_print);

    let statuses: Vec<_> = payload.events.iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, vec!["Picked up", "Out for delivery"]);
}

#[tokio::test]
async fn lookup_tries_waybill_then_tracking_number_then_order_code() {
    let app = TestApp::new().await;
    let carrier = app.seed_carrier("J&T").await;
    let product = app.seed_product("SKU-T2", dec!(10)).await;

    // one order's code collides with another order's waybill
    let first = app
        .create_order("SHARED-1", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let first_tracking = app.assign_carrier(first.id, carrier.id, Some("WB-FIRST")).await;
    let second = app
        .create_order("SO-T2", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let second_tracking = app.assign_carrier(second.id, carrier.id, Some("SHARED-1")).await;

    let lookup = &app.state.services.tracking;

    let (found, matched_by) = lookup.resolve("SHARED-1").await.unwrap().unwrap();
    assert_eq!(found.id, second_tracking.id);
    assert_eq!(matched_by, MatchedBy::Waybill);

    let (found, matched_by) = lookup
        .resolve(&first_tracking.tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first_tracking.id);
    assert_eq!(matched_by, MatchedBy::TrackingNumber);

    let (found, matched_by) = lookup.resolve("SO-T2").await.unwrap().unwrap();
    assert_eq!(found.id, second_tracking.id);
    assert_eq!(matched_by, MatchedBy::OrderCode);
}

#[tokio::test]
async fn unknown_and_blank_codes() {
    let app = TestApp::new().await;
    let lookup = &app.state.services.tracking;

    let err = lookup.search(CLIENT, "NOPE-404", Locale::En).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = lookup.search(CLIENT, "   ", Locale::En).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn order_without_shipment_is_not_found() {
    let app = TestApp::new().await;
    let product = app.seed_product("SKU-T3", dec!(10)).await;
    app.create_order("SO-T3", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;

    let err = app
        .state
        .services
        .tracking
        .search(CLIENT, "SO-T3", Locale::En)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn eleventh_search_in_a_minute_is_rate_limited() {
    let app = TestApp::new().await;
    let lookup = &app.state.services.tracking;

    // misses count against the window too
    for _ in 0..10 {
        let err = lookup.search(CLIENT, "MISSING", Locale::En).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
    let err = lookup.search(CLIENT, "MISSING", Locale::En).await.unwrap_err();
    assert_matches!(err, ServiceError::RateLimitExceeded);

    // other clients are unaffected
    let err = lookup
        .search("198.51.100.1", "MISSING", Locale::En)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    app.clock.advance(Duration::from_secs(61));
    let err = lookup.search(CLIENT, "MISSING", Locale::En).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn custom_window_limits_apply() {
    let app = TestApp::with_rate_limit(RateLimitConfig {
        requests_per_window: 2,
        window_duration: Duration::from_secs(10),
    })
    .await;
    let lookup = &app.state.services.tracking;

    for _ in 0..2 {
        assert!(lookup.search(CLIENT, "X", Locale::En).await.is_err());
    }
    let err = lookup.search(CLIENT, "X", Locale::En).await.unwrap_err();
    assert_matches!(err, ServiceError::RateLimitExceeded);
}

#[tokio::test]
async fn documents_are_listed_with_localized_labels_and_downloadable() {
    let app = TestApp::new().await;
    let carrier = app.seed_carrier("SiCepat").await;
    let product = app.seed_product("SKU-T4", dec!(10)).await;
    let order = app
        .create_order("SO-T4", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let tracking = app.assign_carrier(order.id, carrier.id, Some("WB-DOC")).await;

    std::fs::create_dir_all(app.documents.path().join("waybills")).unwrap();
    std::fs::write(app.documents.path().join("waybills/wb-doc.pdf"), b"%PDF-1.4 test").unwrap();

    let document = app
        .state
        .services
        .shipments
        .attach_document(
            tracking.id,
            AttachDocumentRequest {
                document_type: DocumentType::Waybill,
                file_path: "waybills/wb-doc.pdf".to_string(),
                notes: None,
            },
            &admin(),
        )
        .await
        .unwrap();

    let payload = app
        .state
        .services
        .tracking
        .search(CLIENT, "WB-DOC", Locale::Id)
        .await
        .unwrap();
    assert_eq!(payload.documents.len(), 1);
    assert_eq!(payload.documents[0].label, "Surat jalan");

    let (meta, bytes) = app.state.services.tracking.document(document.id).await.unwrap();
    assert_eq!(meta.document_type, DocumentType::Waybill);
    assert_eq!(bytes, b"%PDF-1.4 test");
}

#[tokio::test]
async fn traversal_paths_are_refused_when_attaching() {
    let app = TestApp::new().await;
    let carrier = app.seed_carrier("AnterAja").await;
    let product = app.seed_product("SKU-T5", dec!(10)).await;
    let order = app
        .create_order("SO-T5", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let tracking = app.assign_carrier(order.id, carrier.id, None).await;

    let err = app
        .state
        .services
        .shipments
        .attach_document(
            tracking.id,
            AttachDocumentRequest {
                document_type: DocumentType::Invoice,
                file_path: "../../etc/passwd".to_string(),
                notes: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn missing_document_file_is_not_found() {
    let app = TestApp::new().await;
    let carrier = app.seed_carrier("Ninja").await;
    let product = app.seed_product("SKU-T6", dec!(10)).await;
    let order = app
        .create_order("SO-T6", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let tracking = app.assign_carrier(order.id, carrier.id, None).await;
    let document = app
        .state
        .services
        .shipments
        .attach_document(
            tracking.id,
            AttachDocumentRequest {
                document_type: DocumentType::Photo,
                file_path: "photos/missing.jpg".to_string(),
                notes: None,
            },
            &admin(),
        )
        .await
        .unwrap();

    let err = app
        .state
        .services
        .tracking
        .document(document.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn duplicate_waybills_are_rejected() {
    let app = TestApp::new().await;
    let carrier = app.seed_carrier("POS").await;
    let product = app.seed_product("SKU-T7", dec!(10)).await;
    let a = app
        .create_order("SO-T7A", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    let b = app
        .create_order("SO-T7B", None, &[(product.id, dec!(1), dec!(10))], dec!(0))
        .await;
    app.assign_carrier(a.id, carrier.id, Some("WB-DUP")).await;

    let err = app
        .state
        .services
        .shipments
        .assign_carrier(
            b.id,
            delivery_tracking::dto::delivery::AssignCarrierRequest {
                carrier_id: carrier.id,
                waybill_number: Some("WB-DUP".to_string()),
                estimated_delivery_date: None,
                notes: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

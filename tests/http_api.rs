use actix_web::dev::Service as _;
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use chrono::Duration;
use serde_json::{json, Value};

use service_desk::api;
use service_desk::api::auth::{JwtMiddleware, Permission};
use service_desk::models::PaymentType;
use service_desk::store::Store;

mod support;

use support::{at, bearer, memory_state, seed_service, RENEW_PASSWORD};

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(api::public_routes)
                .service(
                    web::scope("/api")
                        .wrap(JwtMiddleware)
                        .configure(api::admin_routes),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn first_sighting_creates_trial_and_next_day_reuses_it() {
    let (state, clock, store) = memory_state(at(2025, 1, 1));
    let app = app!(state);

    let req = TestRequest::post()
        .uri("/validate")
        .insert_header(("User-Agent", "pos-client/2.1"))
        .set_json(json!({ "deviceToken": "dev-42", "serviceName": "POS App" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["serviceType"], json!("new"));
    assert_eq!(body["daysRemaining"], json!(15));
    let service_id = body["service"]["id"].as_i64().expect("service id");

    clock.advance(Duration::days(1));

    let req = TestRequest::post()
        .uri("/validate")
        .set_json(json!({ "deviceToken": "dev-42", "serviceName": "POS App" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["serviceType"], json!("existing"));
    assert_eq!(body["daysRemaining"], json!(14));
    assert_eq!(body["service"]["id"].as_i64(), Some(service_id));

    assert_eq!(store.list_services(None).await.expect("services").len(), 1);

    // Audit rows are written in the background.
    let mut logs = Vec::new();
    for _ in 0..50 {
        logs = store.list_api_logs(None, 10).await.expect("logs");
        if logs.len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.service_id == Some(service_id as i32)));
    assert!(logs.iter().any(|l| l.user_agent.as_deref() == Some("pos-client/2.1")));
    assert!(logs.iter().any(|l| l.response_status == 201));
}

#[actix_web::test]
async fn validation_errors_are_structured() {
    let (state, _clock, _store) = memory_state(at(2025, 1, 1));
    let app = app!(state);

    let req = TestRequest::post()
        .uri("/validate")
        .set_json(json!({ "serviceName": "POS App" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("VALIDATION_ERROR"));
}

#[actix_web::test]
async fn malformed_validation_body_is_structured_and_logged() {
    let (state, _clock, store) = memory_state(at(2025, 1, 1));
    let app = app!(state);

    let req = TestRequest::post()
        .uri("/validate")
        .insert_header(("Content-Type", "text/plain"))
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("VALIDATION_ERROR"));

    let mut logs = Vec::new();
    for _ in 0..50 {
        logs = store.list_api_logs(None, 10).await.expect("logs");
        if !logs.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].response_status, 400);
    assert_eq!(logs[0].validation_type.as_deref(), Some("error"));
    assert_eq!(logs[0].request_body, Some(json!("not json")));
    assert_eq!(logs[0].service_id, None);
}

#[actix_web::test]
async fn validation_store_failure_is_internal_and_logged() {
    let (state, _clock, store) = memory_state(at(2025, 1, 1));
    let app = app!(state);

    let req = TestRequest::post()
        .uri("/validate")
        .set_json(json!({ "deviceToken": "dev-9", "serviceName": "POS App" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    store.set_fail_on_service_change(true).await;
    let req = TestRequest::post()
        .uri("/validate")
        .set_json(json!({ "deviceToken": "dev-9", "serviceName": "POS App", "companyName": "Acme" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("INTERNAL_ERROR"));
    assert_eq!(body["message"], json!("internal error"));

    let mut logs = Vec::new();
    for _ in 0..50 {
        logs = store.list_api_logs(None, 10).await.expect("logs");
        if logs.len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(logs.iter().any(|l| l.response_status == 500));
}

#[actix_web::test]
async fn expired_trial_is_reported_without_renewal() {
    let (state, clock, _store) = memory_state(at(2025, 1, 1));
    let app = app!(state);
    let payload = json!({ "deviceToken": "dev-7", "serviceName": "POS App" });

    let req = TestRequest::post().uri("/validate").set_json(&payload).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    clock.advance(Duration::days(16));
    let req = TestRequest::post().uri("/validate").set_json(&payload).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["valid"], json!(false));
    assert_eq!(body["code"], json!("SERVICE_EXPIRED"));
}

#[actix_web::test]
async fn renewal_extends_by_a_year_and_moves_the_reminder() {
    let (state, _clock, store) = memory_state(at(2025, 1, 5));
    let service = seed_service(store.as_ref(), PaymentType::OneYear, at(2024, 1, 10), at(2025, 1, 10)).await;
    let app = app!(state);

    let req = TestRequest::post()
        .uri("/renew")
        .set_json(json!({ "token": service.id.to_string(), "renewPassword": "nope" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("INVALID_RENEW_PASSWORD"));

    let req = TestRequest::post()
        .uri("/renew")
        .set_json(json!({
            "token": service.id,
            "renewPassword": RENEW_PASSWORD,
            "endingDate": "2026-01-10T12:00:00Z"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["historyRecorded"], json!(true));

    let history = store.list_renew_history(service.id).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].renewal_type, PaymentType::OneYear);
    let reminders = store.list_reminders(Some(service.id)).await.expect("reminders");
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].scheduled_at, at(2026, 1, 3));

    let req = TestRequest::post()
        .uri("/renew")
        .set_json(json!({
            "token": service.id,
            "renewPassword": RENEW_PASSWORD,
            "endingDate": "2025-12-01T12:00:00Z"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("INVALID_END_DATE"));

    let req = TestRequest::post()
        .uri("/renew")
        .set_json(json!({ "token": 9999, "renewPassword": RENEW_PASSWORD }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cron_scan_alerts_once_for_an_expired_service() {
    let (state, _clock, store) = memory_state(at(2025, 3, 10));
    seed_service(store.as_ref(), PaymentType::OneMonth, at(2025, 2, 9), at(2025, 3, 9)).await;
    let app = app!(state);

    let req = TestRequest::get().uri("/cron/expiry-check").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["processed"], json!(1));
    assert_eq!(body["newNotifications"], json!(1));
    assert_eq!(body["details"][0]["bucket"], json!("expired"));

    let req = TestRequest::get().uri("/cron/expiry-check").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["newNotifications"], json!(0));

    let notes = store.list_notifications(false).await.expect("notifications");
    assert_eq!(notes.len(), 1);
    assert!(notes[0].title.contains("Hizmet Süresi Doldu"));

    assert!(store.try_lock_job(424242).await.expect("lock"));
    let req = TestRequest::get().uri("/cron/expiry-check").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("NOTIFIER_BUSY"));
}

#[actix_web::test]
async fn admin_routes_require_a_token_and_permissions() {
    let (state, _clock, store) = memory_state(at(2025, 1, 5));
    seed_service(store.as_ref(), PaymentType::OneYear, at(2024, 1, 10), at(2025, 1, 10)).await;
    let app = app!(state);

    let req = TestRequest::get().uri("/api/services").to_request();
    let err = app.call(req).await.err().expect("missing token is rejected");
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/services")
        .insert_header(bearer(&[Permission::ViewLogs]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("FORBIDDEN"));

    let req = TestRequest::get()
        .uri("/api/services")
        .insert_header(bearer(&[Permission::ViewServices]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["status"], json!("upcoming"));
    assert_eq!(body[0]["daysRemaining"], json!(5));
    assert_eq!(body[0]["paymentType"], json!("1year"));
}

#[actix_web::test]
async fn staff_manage_customers_and_services() {
    let (state, _clock, store) = memory_state(at(2025, 1, 31));
    let app = app!(state);
    let editor = [
        Permission::EditCustomers,
        Permission::ViewCustomers,
        Permission::EditServices,
        Permission::ViewServices,
        Permission::ViewReminders,
    ];

    let req = TestRequest::post()
        .uri("/api/customers")
        .insert_header(bearer(&editor))
        .set_json(json!({ "name": "Acme", "tableName": "Masa 1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let customer: Value = test::read_body_json(resp).await;
    let customer_id = customer["id"].as_i64().expect("customer id");

    let req = TestRequest::post()
        .uri(&format!("/api/customers/{customer_id}/services"))
        .insert_header(bearer(&editor))
        .set_json(json!([
            { "name": "Adisyon", "paymentType": "1month", "startingDate": "2025-01-31T12:00:00Z" },
            { "name": "Mutfak", "paymentType": "unlimited", "periodPrice": "0" }
        ]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created[0]["endingDate"], json!("2025-02-28T12:00:00Z"));
    assert_eq!(store.list_reminders(None).await.expect("reminders").len(), 1);

    let req = TestRequest::delete()
        .uri(&format!("/api/customers/{customer_id}"))
        .insert_header(bearer(&editor))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let service_id = created[0]["id"].as_i64().expect("service id");
    let req = TestRequest::put()
        .uri(&format!("/api/services/{service_id}"))
        .insert_header(bearer(&editor))
        .set_json(json!({ "paymentType": "unlimited" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome: Value = test::read_body_json(resp).await;
    assert_eq!(outcome["case"], json!("unlimitedTransition"));
    assert_eq!(outcome["historyRecorded"], json!(false));

    let req = TestRequest::get()
        .uri("/api/reminders")
        .insert_header(bearer(&editor))
        .to_request();
    let reminders: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(reminders, json!([]));
}

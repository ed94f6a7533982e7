// src/api/validate.rs

use actix_web::http::StatusCode;
use actix_web::{post, web, HttpRequest, HttpResponse, ResponseError};
use serde_json::Value;

use crate::api::{client_ip, user_agent};
use crate::error::EngineError;
use crate::models::NewApiLog;
use crate::trial::{DeviceValidationRequest, ValidationResponse};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/validate",
    tag = "devices",
    request_body = DeviceValidationRequest,
    responses(
        (status = 200, description = "Known device with a running service", body = ValidationResponse),
        (status = 201, description = "Trial provisioned for a new device", body = ValidationResponse),
        (status = 400, description = "Missing fields or SERVICE_EXPIRED"),
        (status = 403, description = "SERVICE_INACTIVE"),
        (status = 409, description = "DUPLICATE_TRIAL: concurrent first call for the same device"),
        (status = 500, description = "Server error")
    )
)]
#[post("/validate")]
pub async fn validate_device(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Bytes,
) -> HttpResponse {
    let parsed = serde_json::from_slice::<Value>(&payload);

    let result = match &parsed {
        Ok(body) => match serde_json::from_value::<DeviceValidationRequest>(body.clone()) {
            Ok(request) => state.engine.validate_device(&request).await,
            Err(e) => Err(EngineError::Validation(format!("invalid request body: {e}"))),
        },
        Err(e) => Err(EngineError::Validation(format!("invalid request body: {e}"))),
    };

    // Unparseable bodies are kept verbatim for the audit log.
    let body = match parsed {
        Ok(body) => body,
        Err(_) if payload.is_empty() => Value::Null,
        Err(_) => Value::String(String::from_utf8_lossy(&payload).into_owned()),
    };

    let (status, response_body, service_id, validation_type) = match &result {
        Ok(validation) => {
            let response = state.engine.validation_response(validation);
            (
                validation.http_status(),
                serde_json::to_value(&response).unwrap_or(Value::Null),
                Some(validation.service().id),
                validation.kind(),
            )
        }
        Err(e) => (e.status_code(), e.body(), None, "error"),
    };

    if let Err(e) = &result {
        if e.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("device validation failed: {e}");
        } else {
            log::info!("device validation refused: {e}");
        }
    }

    // Fire and forget: the handle is dropped on purpose.
    let _ = state.engine.record_api_call(NewApiLog {
        endpoint: req.path().to_string(),
        method: req.method().to_string(),
        ip_address: client_ip(&req),
        user_agent: user_agent(&req),
        service_name: body
            .get("serviceName")
            .and_then(Value::as_str)
            .map(str::to_string),
        device_token: body
            .get("deviceToken")
            .and_then(Value::as_str)
            .map(str::to_string),
        request_body: (!body.is_null()).then_some(body),
        response_status: i32::from(status.as_u16()),
        response_body: Some(response_body.clone()),
        validation_type: Some(validation_type.to_string()),
        service_id,
        created_at: state.engine.now(),
    });

    HttpResponse::build(status).json(response_body)
}

// src/api/renew.rs

use actix_web::{post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::AppState;

/// Service id as sent by device clients, which use both numbers and strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceToken {
    Id(i32),
    Text(String),
}

impl ServiceToken {
    pub fn service_id(&self) -> Result<i32, EngineError> {
        match self {
            ServiceToken::Id(id) => Ok(*id),
            ServiceToken::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| EngineError::Validation(format!("invalid token {raw:?}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    /// The service id.
    #[schema(value_type = String, example = "42")]
    pub token: ServiceToken,
    pub renew_password: String,
    /// Defaults to one year after the later of the current end and today.
    pub ending_date: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/renew",
    tag = "devices",
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Service renewed"),
        (status = 400, description = "INVALID_END_DATE or malformed token"),
        (status = 403, description = "INVALID_RENEW_PASSWORD"),
        (status = 404, description = "Unknown service"),
        (status = 500, description = "Server error")
    )
)]
#[post("/renew")]
pub async fn renew_service(
    state: web::Data<AppState>,
    payload: web::Json<RenewRequest>,
) -> Result<HttpResponse, EngineError> {
    let payload = payload.into_inner();
    let service_id = payload.token.service_id()?;

    let outcome = state
        .engine
        .renew(
            service_id,
            &payload.renew_password,
            &state.renew_password,
            payload.ending_date,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Hizmet başarıyla yenilendi.",
        "previousEndingDate": outcome.previous_ending_date,
        "newEndingDate": outcome.service.ending_date,
        "historyRecorded": outcome.history_recorded,
        "service": outcome.service,
    })))
}

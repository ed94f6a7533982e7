// src/api/cron.rs

use actix_web::{get, web, HttpResponse};

use crate::error::EngineError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/cron/expiry-check",
    tag = "cron",
    responses(
        (status = 200, description = "Scan summary: processed, newNotifications, details"),
        (status = 409, description = "NOTIFIER_BUSY: another scan is running"),
        (status = 500, description = "Server error")
    )
)]
#[get("/cron/expiry-check")]
pub async fn expiry_check(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let summary = state.engine.run_expiry_scan().await?;
    Ok(HttpResponse::Ok().json(summary))
}

// src/api/logs.rs

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::auth::{Claims, Permission};
use crate::error::EngineError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ApiLogQuery {
    pub service_id: Option<i32>,
    /// Defaults to 100, capped at 1000.
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/api-logs",
    tag = "logs",
    params(ApiLogQuery),
    responses((status = 200, description = "Device call audit rows, newest first"))
)]
#[get("/api-logs")]
pub async fn list_api_logs(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    query: web::Query<ApiLogQuery>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewLogs)?;
    let logs = state
        .engine
        .list_api_logs(query.service_id, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(logs))
}

// src/api/reminders.rs

use actix_web::{delete, get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::api::auth::{Claims, Permission};
use crate::error::EngineError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReminderQuery {
    pub service_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/reminders",
    tag = "reminders",
    params(ReminderQuery),
    responses((status = 200, description = "Reminders ordered by schedule"))
)]
#[get("/reminders")]
pub async fn list_reminders(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    query: web::Query<ReminderQuery>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewReminders)?;
    Ok(HttpResponse::Ok().json(state.engine.list_reminders(query.service_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/reminders/{id}",
    tag = "reminders",
    params(("id" = i32, Path, description = "Reminder id")),
    responses(
        (status = 200, description = "Reminder removed"),
        (status = 404, description = "Unknown reminder")
    )
)]
#[delete("/reminders/{id}")]
pub async fn delete_reminder(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditReminders)?;
    state.engine.delete_reminder(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// src/api/notifications.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::api::auth::{Claims, Permission};
use crate::error::EngineError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only unread notifications.
    #[serde(default)]
    pub unread: bool,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(NotificationQuery),
    responses((status = 200, description = "Notifications, newest first"))
)]
#[get("/notifications")]
pub async fn list_notifications(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewNotifications)?;
    Ok(HttpResponse::Ok().json(state.engine.list_notifications(query.unread).await?))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(("id" = i32, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Unknown notification")
    )
)]
#[post("/notifications/{id}/read")]
pub async fn mark_read(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewNotifications)?;
    state.engine.mark_notification_read(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    responses((status = 200, description = "Number of notifications marked as read"))
)]
#[post("/notifications/read-all")]
pub async fn mark_all_read(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewNotifications)?;
    let updated = state.engine.mark_all_notifications_read().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "updated": updated })))
}

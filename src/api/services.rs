// src/api/services.rs

use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::api::auth::{Claims, Permission};
use crate::error::EngineError;
use crate::services::{NewServiceRequest, ServiceUpdateRequest};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ServiceQuery {
    /// Only services of this customer.
    pub customer_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/services",
    tag = "services",
    params(ServiceQuery),
    responses(
        (status = 200, description = "Services with status and daysRemaining"),
        (status = 403, description = "Missing canViewServices")
    )
)]
#[get("/services")]
pub async fn list_services(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    query: web::Query<ServiceQuery>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewServices)?;
    let services = state.engine.list_services(query.customer_id).await?;
    Ok(HttpResponse::Ok().json(services))
}

#[utoipa::path(
    get,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = i32, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service with status and daysRemaining"),
        (status = 404, description = "Unknown service")
    )
)]
#[get("/services/{id}")]
pub async fn get_service(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewServices)?;
    let service = state.engine.get_service(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(service))
}

#[utoipa::path(
    post,
    path = "/api/services",
    tag = "services",
    request_body = NewServiceRequest,
    responses(
        (status = 201, description = "Service and its reminder created"),
        (status = 400, description = "Invalid window or missing fields"),
        (status = 404, description = "Unknown customer"),
        (status = 409, description = "Device token already registered")
    )
)]
#[post("/services")]
pub async fn create_service(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    payload: web::Json<NewServiceRequest>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditServices)?;
    let service = state.engine.create_service(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(service))
}

#[utoipa::path(
    post,
    path = "/api/customers/{id}/services",
    tag = "services",
    params(("id" = i32, Path, description = "Owning customer id")),
    request_body = Vec<NewServiceRequest>,
    responses(
        (status = 201, description = "Every service created"),
        (status = 400, description = "One of the services is invalid; nothing was created"),
        (status = 409, description = "Duplicate device token; nothing was created")
    )
)]
#[post("/customers/{id}/services")]
pub async fn create_services_bulk(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<Vec<NewServiceRequest>>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditServices)?;
    let services = state
        .engine
        .create_services_bulk(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(services))
}

#[utoipa::path(
    put,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = i32, Path, description = "Service id")),
    request_body = ServiceUpdateRequest,
    responses(
        (status = 200, description = "Service updated; history and reminders follow the change"),
        (status = 400, description = "Invalid window"),
        (status = 404, description = "Unknown service"),
        (status = 500, description = "SERVICE_UPDATE_FAILED, nothing was written")
    )
)]
#[put("/services/{id}")]
pub async fn update_service(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<ServiceUpdateRequest>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditServices)?;
    let outcome = state
        .engine
        .update_service(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = i32, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service, reminders and history removed"),
        (status = 404, description = "Unknown service")
    )
)]
#[delete("/services/{id}")]
pub async fn delete_service(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditServices)?;
    state.engine.delete_service(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[utoipa::path(
    get,
    path = "/api/services/{id}/history",
    tag = "services",
    params(("id" = i32, Path, description = "Service id")),
    responses(
        (status = 200, description = "Renewal history, newest first"),
        (status = 404, description = "Unknown service")
    )
)]
#[get("/services/{id}/history")]
pub async fn renew_history(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewServices)?;
    let history = state.engine.renew_history(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

// src/api/customers.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::api::auth::{Claims, Permission};
use crate::customers::NewCustomerRequest;
use crate::error::EngineError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "customers",
    responses((status = 200, description = "All customers"))
)]
#[get("/customers")]
pub async fn list_customers(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewCustomers)?;
    Ok(HttpResponse::Ok().json(state.engine.list_customers().await?))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer"),
        (status = 404, description = "Unknown customer")
    )
)]
#[get("/customers/{id}")]
pub async fn get_customer(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::ViewCustomers)?;
    Ok(HttpResponse::Ok().json(state.engine.get_customer(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "customers",
    request_body = NewCustomerRequest,
    responses(
        (status = 201, description = "Customer created"),
        (status = 400, description = "Missing name")
    )
)]
#[post("/customers")]
pub async fn create_customer(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    payload: web::Json<NewCustomerRequest>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditCustomers)?;
    let customer = state.engine.create_customer(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(customer))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer removed"),
        (status = 404, description = "Unknown customer"),
        (status = 409, description = "Customer still owns services")
    )
)]
#[delete("/customers/{id}")]
pub async fn delete_customer(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, EngineError> {
    claims.require(Permission::EditCustomers)?;
    state.engine.delete_customer(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

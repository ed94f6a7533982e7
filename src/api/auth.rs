// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, HttpMessage};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};

use crate::error::{EngineError, EngineResult};
use crate::AppState;

/// Permission flags carried in staff tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewServices,
    EditServices,
    ViewReminders,
    EditReminders,
    ViewNotifications,
    ViewCustomers,
    EditCustomers,
    ViewLogs,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewServices => "canViewServices",
            Permission::EditServices => "canEditServices",
            Permission::ViewReminders => "canViewReminders",
            Permission::EditReminders => "canEditReminders",
            Permission::ViewNotifications => "canViewNotifications",
            Permission::ViewCustomers => "canViewCustomers",
            Permission::EditCustomers => "canEditCustomers",
            Permission::ViewLogs => "canViewLogs",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Claims {
    pub fn require(&self, permission: Permission) -> EngineResult<()> {
        if self.permissions.iter().any(|p| p == permission.as_str()) {
            Ok(())
        } else {
            log::warn!("permission {} denied for {}", permission.as_str(), self.sub);
            Err(EngineError::Forbidden(permission.as_str()))
        }
    }
}

/// Signs a staff token. Tokens are issued by the dashboard's login flow; this is used by
/// tooling and tests.
pub fn issue_token(
    secret: &str,
    sub: &str,
    permissions: &[Permission],
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
    let claims = Claims {
        sub: sub.to_string(),
        exp,
        permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Middleware that:
/// - reads `Authorization: Bearer <jwt>`
/// - validates it against `AppState::jwt_secret`
/// - puts the [`Claims`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(secret) = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.jwt_secret.clone())
        else {
            return Box::pin(async move {
                Err(actix_web::error::ErrorInternalServerError(
                    "JWT secret not configured",
                ))
            });
        };

        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        let Some(token) = auth_header.strip_prefix("Bearer ") else {
            return Box::pin(async move {
                Err(actix_web::error::ErrorUnauthorized(
                    "Missing or invalid Authorization header",
                ))
            });
        };

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(token_data) => {
                req.extensions_mut().insert(token_data.claims);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(e) => {
                log::debug!("rejected token: {e}");
                Box::pin(async move { Err(actix_web::error::ErrorUnauthorized("Invalid token")) })
            }
        }
    }
}

// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("a service is already registered for device {0}")]
    DuplicateTrial(String),

    #[error("missing permission {0}")]
    Forbidden(&'static str),

    #[error("invalid renew password")]
    InvalidRenewPassword,

    #[error("new ending date {new} must be after current ending date {current}")]
    InvalidEndDate { current: String, new: String },

    #[error("expiry scan already running")]
    NotifierBusy,

    #[error("service update failed: {0}")]
    ServiceUpdateFailed(#[source] StoreError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::DuplicateTrial(_) => "DUPLICATE_TRIAL",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::InvalidRenewPassword => "INVALID_RENEW_PASSWORD",
            EngineError::InvalidEndDate { .. } => "INVALID_END_DATE",
            EngineError::NotifierBusy => "NOTIFIER_BUSY",
            EngineError::ServiceUpdateFailed(_) => "SERVICE_UPDATE_FAILED",
            EngineError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            EngineError::Store(StoreError::Conflict(_)) => "CONFLICT",
            EngineError::Store(StoreError::Stale(_)) => "SERVICE_CHANGED",
            EngineError::Store(_) => "INTERNAL_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// JSON body sent to clients. Internal failures carry no detail.
    pub fn body(&self) -> serde_json::Value {
        let message = if self.is_internal() {
            "internal error".to_string()
        } else {
            self.to_string()
        };
        json!({
            "success": false,
            "error": self.code(),
            "message": message
        })
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Validation(_) | EngineError::InvalidEndDate { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::Conflict(_)
            | EngineError::DuplicateTrial(_)
            | EngineError::NotifierBusy => StatusCode::CONFLICT,
            EngineError::Forbidden(_) | EngineError::InvalidRenewPassword => StatusCode::FORBIDDEN,
            EngineError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            EngineError::Store(StoreError::Conflict(_) | StoreError::Stale(_)) => {
                StatusCode::CONFLICT
            }
            EngineError::ServiceUpdateFailed(_) | EngineError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_internal() {
            log::error!("request failed: {self}");
        }
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

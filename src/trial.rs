// src/trial.rs

use actix_web::http::StatusCode;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Currency, Customer, NewCustomer, NewService, PaymentType, Service, ServiceMetadata,
    DEFAULT_CATEGORY,
};
use crate::reminders::trial_reminder;
use crate::status::days_remaining;
use crate::store::StoreError;

pub const TRIAL_DAYS: i64 = 15;

/// Sentinel key of the shared customer owning every auto-provisioned trial.
pub const TRIAL_CUSTOMER_KEY: &str = "trial";
pub const TRIAL_CUSTOMER_NAME: &str = "Trial Customer";
pub const TRIAL_DESCRIPTION_PREFIX: &str = "Trial service";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceValidationRequest {
    pub device_token: Option<String>,
    pub service_name: Option<String>,
    pub company_name: Option<String>,
    pub terminal: Option<String>,
}

/// Where a device stands after a validation call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceValidation {
    /// First sighting: a trial was provisioned.
    Created(Service),
    /// Known device with a running service. `updated` when metadata was corrected.
    Existing { service: Service, updated: bool },
    Inactive(Service),
    Expired(Service),
}

impl DeviceValidation {
    pub fn service(&self) -> &Service {
        match self {
            DeviceValidation::Created(s)
            | DeviceValidation::Existing { service: s, .. }
            | DeviceValidation::Inactive(s)
            | DeviceValidation::Expired(s) => s,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            DeviceValidation::Created(_) => StatusCode::CREATED,
            DeviceValidation::Existing { .. } => StatusCode::OK,
            DeviceValidation::Inactive(_) => StatusCode::FORBIDDEN,
            DeviceValidation::Expired(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label stored as the ApiLog validation type.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceValidation::Created(_) => "trial_created",
            DeviceValidation::Existing { .. } => "existing",
            DeviceValidation::Inactive(_) => "inactive",
            DeviceValidation::Expired(_) => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedService {
    pub id: i32,
    pub name: String,
    pub company_name: Option<String>,
    pub terminal: Option<String>,
    pub payment_type: PaymentType,
    pub starting_date: String,
    pub ending_date: String,
}

impl From<&Service> for ValidatedService {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            company_name: s.company_name.clone(),
            terminal: s.terminal.clone(),
            payment_type: s.payment_type,
            starting_date: s.starting_date.to_rfc3339(),
            ending_date: s.ending_date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub success: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    pub days_remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub service: ValidatedService,
}

impl Engine {
    /// Resolves a device token to its service, provisioning a 15-day trial the first time
    /// the token is seen.
    pub async fn validate_device(
        &self,
        request: &DeviceValidationRequest,
    ) -> EngineResult<DeviceValidation> {
        let device_token = non_empty(request.device_token.as_deref())
            .ok_or_else(|| EngineError::Validation("deviceToken is required".into()))?;
        let service_name = non_empty(request.service_name.as_deref())
            .ok_or_else(|| EngineError::Validation("serviceName is required".into()))?;

        let existing = match self
            .store()
            .find_active_service_by_name_and_device(service_name, device_token)
            .await?
        {
            Some(service) => Some(service),
            None => self.store().find_service_by_device(device_token).await?,
        };

        match existing {
            Some(service) => self.resolve_existing(service, request).await,
            None => self.provision_trial(device_token, service_name, request).await,
        }
    }

    async fn resolve_existing(
        &self,
        service: Service,
        request: &DeviceValidationRequest,
    ) -> EngineResult<DeviceValidation> {
        if !service.active {
            return Ok(DeviceValidation::Inactive(service));
        }
        if service.ending_date <= self.now() {
            return Ok(DeviceValidation::Expired(service));
        }

        let wanted = ServiceMetadata {
            name: non_empty(request.service_name.as_deref())
                .map_or_else(|| service.name.clone(), str::to_string),
            company_name: non_empty(request.company_name.as_deref())
                .map(str::to_string)
                .or_else(|| service.company_name.clone()),
            terminal: non_empty(request.terminal.as_deref())
                .map(str::to_string)
                .or_else(|| service.terminal.clone()),
        };
        let current = ServiceMetadata {
            name: service.name.clone(),
            company_name: service.company_name.clone(),
            terminal: service.terminal.clone(),
        };
        if wanted == current {
            return Ok(DeviceValidation::Existing {
                service,
                updated: false,
            });
        }

        let service = self.store().update_service_metadata(service.id, wanted).await?;
        log::info!("device metadata corrected service_id={}", service.id);
        Ok(DeviceValidation::Existing {
            service,
            updated: true,
        })
    }

    async fn provision_trial(
        &self,
        device_token: &str,
        service_name: &str,
        request: &DeviceValidationRequest,
    ) -> EngineResult<DeviceValidation> {
        let now = self.now();
        let customer = self.trial_customer().await?;
        let ending_date = now + Duration::days(TRIAL_DAYS);

        let new = NewService {
            name: service_name.to_string(),
            description: Some(format!("{TRIAL_DESCRIPTION_PREFIX} for device {device_token}")),
            company_name: non_empty(request.company_name.as_deref()).map(str::to_string),
            category: DEFAULT_CATEGORY.to_string(),
            payment_type: PaymentType::Custom,
            period_price: Decimal::ZERO,
            currency: Currency::TL,
            active: true,
            starting_date: now,
            ending_date,
            device_token: Some(device_token.to_string()),
            terminal: non_empty(request.terminal.as_deref()).map(str::to_string),
            customer_id: customer.id,
            created_at: now,
        };

        let created = self
            .store()
            .create_services(vec![(new, Some(trial_reminder(ending_date, now)))])
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => EngineError::DuplicateTrial(device_token.to_string()),
                other => EngineError::Store(other),
            })?;

        let service = created
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Store(StoreError::NotFound("created trial".into())))?;
        log::info!(
            "trial provisioned service_id={} device_token={} ends={}",
            service.id,
            device_token,
            service.ending_date
        );
        Ok(DeviceValidation::Created(service))
    }

    /// The shared owner of all trials, created on first use.
    pub async fn trial_customer(&self) -> EngineResult<Customer> {
        let customer = NewCustomer {
            name: TRIAL_CUSTOMER_NAME.to_string(),
            table_name: Some(TRIAL_CUSTOMER_NAME.to_string()),
            email: None,
            phone: None,
            password: None,
            created_at: self.now(),
        };
        Ok(self
            .store()
            .upsert_system_customer(TRIAL_CUSTOMER_KEY, customer)
            .await?)
    }

    /// Renders a validation result as the device-facing response body.
    pub fn validation_response(&self, validation: &DeviceValidation) -> ValidationResponse {
        let service = validation.service();
        let remaining = days_remaining(service.ending_date, self.now()).max(0);
        let (valid, service_type, code, message) = match validation {
            DeviceValidation::Created(_) => (
                true,
                Some("new"),
                None,
                format!("{TRIAL_DAYS} günlük deneme süresi başlatıldı."),
            ),
            DeviceValidation::Existing { .. } => {
                (true, Some("existing"), None, "Hizmet geçerli.".to_string())
            }
            DeviceValidation::Inactive(_) => (
                false,
                None,
                Some("SERVICE_INACTIVE"),
                "Hizmet pasif durumda.".to_string(),
            ),
            DeviceValidation::Expired(_) => (
                false,
                None,
                Some("SERVICE_EXPIRED"),
                "Hizmet süresi dolmuş.".to_string(),
            ),
        };

        ValidationResponse {
            success: valid,
            valid,
            service_type: service_type.map(str::to_string),
            days_remaining: remaining,
            code: code.map(str::to_string),
            message,
            service: ValidatedService::from(service),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

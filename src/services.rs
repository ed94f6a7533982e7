// src/services.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Currency, NewService, PaymentType, RenewHistory, ReminderDraft, Service, DEFAULT_CATEGORY,
};
use crate::reminders::expiry_reminder;
use crate::renewal::{is_stale, RenewalOutcome, ServicePatch, CHANGE_ATTEMPTS};
use crate::status::{classify_status, days_remaining, validate_window, ServiceStatus};
use crate::store::StoreError;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub category: Option<String>,
    pub payment_type: PaymentType,
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub period_price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub active: Option<bool>,
    pub starting_date: Option<DateTime<Utc>>,
    /// Required for `custom`; derived from the payment type otherwise.
    pub ending_date: Option<DateTime<Utc>>,
    pub device_token: Option<String>,
    pub terminal: Option<String>,
    /// Ignored by the bulk endpoint, which takes the customer from the path.
    #[serde(rename = "customerID")]
    pub customer_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub category: Option<String>,
    pub payment_type: Option<PaymentType>,
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub period_price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub active: Option<bool>,
    pub starting_date: Option<DateTime<Utc>>,
    pub ending_date: Option<DateTime<Utc>>,
    pub terminal: Option<String>,
}

impl ServiceUpdateRequest {
    fn into_parts(self) -> (Option<DateTime<Utc>>, Option<PaymentType>, ServicePatch) {
        let patch = ServicePatch {
            name: self.name,
            description: self.description,
            company_name: self.company_name,
            category: self.category,
            period_price: self.period_price,
            currency: self.currency,
            active: self.active,
            starting_date: self.starting_date,
            terminal: self.terminal,
        };
        (self.ending_date, self.payment_type, patch)
    }
}

/// A service as shown to staff, with its derived status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub status: ServiceStatus,
    pub days_remaining: i64,
}

impl Engine {
    fn view(&self, service: Service) -> ServiceView {
        let now = self.now();
        ServiceView {
            status: classify_status(&service, now),
            days_remaining: days_remaining(service.ending_date, now),
            service,
        }
    }

    /// Turns a request into an insertable row plus its initial reminder.
    fn prepare_service(
        &self,
        request: NewServiceRequest,
        customer_id: i32,
    ) -> EngineResult<(NewService, Option<ReminderDraft>)> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("name is required".into()));
        }
        let period_price = request.period_price.unwrap_or(Decimal::ZERO);
        if period_price.is_sign_negative() {
            return Err(EngineError::Validation("periodPrice must not be negative".into()));
        }

        let now = self.now();
        let starting_date = request.starting_date.unwrap_or(now);
        let ending_date = match (request.payment_type, request.ending_date) {
            (PaymentType::Unlimited, _) | (_, None) => self
                .calendar()
                .add_duration(starting_date, request.payment_type)
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "endingDate is required for {} services",
                        request.payment_type
                    ))
                })?,
            (_, Some(ending_date)) => ending_date,
        };
        validate_window(starting_date, ending_date).map_err(EngineError::Validation)?;

        let service = NewService {
            name: name.to_string(),
            description: request.description,
            company_name: request.company_name,
            category: request
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            payment_type: request.payment_type,
            period_price,
            currency: request.currency.unwrap_or_default(),
            active: request.active.unwrap_or(true),
            starting_date,
            ending_date,
            device_token: request.device_token.filter(|t| !t.trim().is_empty()),
            terminal: request.terminal,
            customer_id,
            created_at: now,
        };
        let reminder = expiry_reminder(service.payment_type, service.ending_date, now);
        Ok((service, reminder))
    }

    async fn require_customer_exists(&self, customer_id: i32) -> EngineResult<()> {
        match self.store().get_customer(customer_id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::not_found("customer", customer_id)),
        }
    }

    async fn insert_services(
        &self,
        batch: Vec<(NewService, Option<ReminderDraft>)>,
    ) -> EngineResult<Vec<ServiceView>> {
        let created = self.store().create_services(batch).await.map_err(|e| match e {
            StoreError::Conflict(what) => {
                EngineError::Conflict(format!("device token already registered: {what}"))
            }
            other => EngineError::Store(other),
        })?;
        Ok(created.into_iter().map(|s| self.view(s)).collect())
    }

    /// Creates a service and its one-week reminder together.
    pub async fn create_service(&self, request: NewServiceRequest) -> EngineResult<ServiceView> {
        let customer_id = request
            .customer_id
            .ok_or_else(|| EngineError::Validation("customerID is required".into()))?;
        self.require_customer_exists(customer_id).await?;

        let row = self.prepare_service(request, customer_id)?;
        let mut created = self.insert_services(vec![row]).await?;
        let view = created
            .pop()
            .ok_or_else(|| EngineError::Store(StoreError::NotFound("created service".into())))?;
        log::info!(
            "service created service_id={} customer_id={} payment_type={}",
            view.service.id,
            customer_id,
            view.service.payment_type
        );
        Ok(view)
    }

    /// Creates every requested service for one customer, or none of them.
    pub async fn create_services_bulk(
        &self,
        customer_id: i32,
        requests: Vec<NewServiceRequest>,
    ) -> EngineResult<Vec<ServiceView>> {
        if requests.is_empty() {
            return Err(EngineError::Validation("at least one service is required".into()));
        }
        self.require_customer_exists(customer_id).await?;

        let batch = requests
            .into_iter()
            .map(|r| self.prepare_service(r, customer_id))
            .collect::<EngineResult<Vec<_>>>()?;
        let created = self.insert_services(batch).await?;
        log::info!(
            "services created in bulk customer_id={} count={}",
            customer_id,
            created.len()
        );
        Ok(created)
    }

    pub async fn update_service(
        &self,
        id: i32,
        request: ServiceUpdateRequest,
    ) -> EngineResult<RenewalOutcome> {
        let (ending_date, payment_type, patch) = request.into_parts();
        let mut attempt = 1;
        loop {
            let service = self.require_service(id).await?;
            let target = ending_date.unwrap_or(service.ending_date);
            match self
                .extend_service(&service, target, payment_type, patch.clone())
                .await
            {
                Err(e) if is_stale(&e) && attempt < CHANGE_ATTEMPTS => {
                    log::info!("service changed during update, retrying service_id={id} attempt={attempt}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub async fn delete_service(&self, id: i32) -> EngineResult<()> {
        self.store().delete_service(id).await?;
        log::info!("service deleted service_id={id}");
        Ok(())
    }

    pub async fn list_services(&self, customer_id: Option<i32>) -> EngineResult<Vec<ServiceView>> {
        let services = self.store().list_services(customer_id).await?;
        Ok(services.into_iter().map(|s| self.view(s)).collect())
    }

    pub async fn get_service(&self, id: i32) -> EngineResult<ServiceView> {
        let service = self.require_service(id).await?;
        Ok(self.view(service))
    }

    pub async fn renew_history(&self, service_id: i32) -> EngineResult<Vec<RenewHistory>> {
        self.require_service(service_id).await?;
        Ok(self.store().list_renew_history(service_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCustomer;
    use crate::renewal::RenewalCase;
    use crate::store::Store;
    use crate::testing::{at, test_engine};
    use chrono::Duration;

    fn request(payment_type: PaymentType) -> NewServiceRequest {
        NewServiceRequest {
            name: "Adisyon".into(),
            description: None,
            company_name: Some("Acme".into()),
            category: None,
            payment_type,
            period_price: Some(Decimal::new(150000, 2)),
            currency: None,
            active: None,
            starting_date: Some(at(2025, 1, 31)),
            ending_date: None,
            device_token: None,
            terminal: None,
            customer_id: None,
        }
    }

    async fn customer(engine: &Engine) -> i32 {
        engine
            .store()
            .insert_customer(NewCustomer {
                name: "Acme".into(),
                table_name: None,
                email: None,
                phone: None,
                password: None,
                created_at: engine.now(),
            })
            .await
            .expect("customer")
            .id
    }

    #[tokio::test]
    async fn ending_date_is_derived_from_the_payment_type() {
        let (engine, _clock, store) = test_engine(at(2025, 1, 31));
        let customer_id = customer(&engine).await;

        let view = engine
            .create_service(NewServiceRequest {
                customer_id: Some(customer_id),
                ..request(PaymentType::OneMonth)
            })
            .await
            .expect("create");

        assert_eq!(view.service.ending_date, at(2025, 2, 28));
        assert_eq!(view.service.category, DEFAULT_CATEGORY);
        assert_eq!(view.service.currency, Currency::TL);
        assert_eq!(view.status, ServiceStatus::Upcoming);

        let reminders = store.list_reminders(Some(view.service.id)).await.expect("reminders");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].scheduled_at, at(2025, 2, 21));
    }

    #[tokio::test]
    async fn unlimited_services_get_a_century_and_no_reminder() {
        let (engine, _clock, store) = test_engine(at(2025, 1, 31));
        let customer_id = customer(&engine).await;

        let view = engine
            .create_service(NewServiceRequest {
                customer_id: Some(customer_id),
                ending_date: Some(at(2025, 6, 1)),
                ..request(PaymentType::Unlimited)
            })
            .await
            .expect("create");

        assert_eq!(view.service.ending_date, at(2125, 1, 31));
        assert!(store.list_reminders(Some(view.service.id)).await.expect("reminders").is_empty());
    }

    #[tokio::test]
    async fn custom_services_need_an_explicit_window() {
        let (engine, _clock, _store) = test_engine(at(2025, 1, 31));
        let customer_id = customer(&engine).await;

        let err = engine
            .create_service(NewServiceRequest {
                customer_id: Some(customer_id),
                ..request(PaymentType::Custom)
            })
            .await
            .expect_err("no end date");
        assert!(matches!(err, EngineError::Validation(_)));

        let err = engine
            .create_service(NewServiceRequest {
                customer_id: Some(customer_id),
                ending_date: Some(at(2025, 1, 1)),
                ..request(PaymentType::Custom)
            })
            .await
            .expect_err("end before start");
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let (engine, _clock, _store) = test_engine(at(2025, 1, 31));
        let err = engine
            .create_service(NewServiceRequest {
                customer_id: Some(77),
                ..request(PaymentType::OneYear)
            })
            .await
            .expect_err("no customer");
        assert!(matches!(err, EngineError::NotFound { entity: "customer", .. }));
    }

    #[tokio::test]
    async fn bulk_create_is_all_or_nothing() {
        let (engine, _clock, store) = test_engine(at(2025, 1, 31));
        let customer_id = customer(&engine).await;

        let err = engine
            .create_services_bulk(
                customer_id,
                vec![
                    NewServiceRequest {
                        device_token: Some("dev-1".into()),
                        ..request(PaymentType::OneYear)
                    },
                    NewServiceRequest {
                        device_token: Some("dev-1".into()),
                        ..request(PaymentType::SixMonths)
                    },
                ],
            )
            .await
            .expect_err("duplicate device");
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(store.list_services(None).await.expect("services").is_empty());
        assert!(store.list_reminders(None).await.expect("reminders").is_empty());

        let created = engine
            .create_services_bulk(
                customer_id,
                vec![request(PaymentType::OneYear), request(PaymentType::ThreeYears)],
            )
            .await
            .expect("bulk");
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].service.ending_date, at(2028, 1, 31));
        assert_eq!(store.list_reminders(None).await.expect("reminders").len(), 2);
    }

    #[tokio::test]
    async fn update_goes_through_the_renewal_rules() {
        let (engine, _clock, store) = test_engine(at(2025, 1, 31));
        let customer_id = customer(&engine).await;
        let view = engine
            .create_service(NewServiceRequest {
                customer_id: Some(customer_id),
                ..request(PaymentType::OneYear)
            })
            .await
            .expect("create");

        let outcome = engine
            .update_service(
                view.service.id,
                ServiceUpdateRequest {
                    ending_date: Some(view.service.ending_date + Duration::days(365)),
                    terminal: Some("Kasa 1".into()),
                    ..ServiceUpdateRequest::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(outcome.case, RenewalCase::ForwardExtension(PaymentType::OneYear));
        assert_eq!(outcome.service.terminal.as_deref(), Some("Kasa 1"));
        assert_eq!(engine.renew_history(view.service.id).await.expect("history").len(), 1);

        engine.delete_service(view.service.id).await.expect("delete");
        assert!(store.list_reminders(None).await.expect("reminders").is_empty());
        let err = engine.get_service(view.service.id).await.expect_err("gone");
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}

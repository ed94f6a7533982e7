// src/renewal.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::clock::Calendar;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Currency, NewNotification, NewRenewHistory, NotificationType, PaymentType, Service,
};
use crate::reminders::expiry_reminder;
use crate::status::validate_window;
use crate::store::{ReminderAction, ServiceChange, StoreError};

pub const RENEWED_TITLE: &str = "Hizmet Yenilendi";
pub const RENEWAL_REJECTED_TITLE: &str = "Yenileme Başarısız";

/// Times a renewal is re-planned when the service changed underneath it.
pub const CHANGE_ATTEMPTS: usize = 3;

/// How an update moves a service's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RenewalCase {
    /// Either side is `unlimited`. Never recorded as a renewal.
    UnlimitedTransition,
    /// End date moved forward; carries the descriptive renewal bucket.
    ForwardExtension(PaymentType),
    PaymentTypeChange,
    /// End date moved backward. Reminders follow, no history row.
    Shortened,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPlan {
    pub case: RenewalCase,
    pub ending_date: DateTime<Utc>,
    pub payment_type: PaymentType,
}

impl RenewalPlan {
    pub fn regenerates_reminders(&self) -> bool {
        !matches!(self.case, RenewalCase::Unchanged)
    }

    pub fn renewal_bucket(&self) -> Option<PaymentType> {
        match self.case {
            RenewalCase::ForwardExtension(bucket) => Some(bucket),
            _ => None,
        }
    }
}

/// Decides what moving `current` to `new_ending_date` / `new_payment_type` amounts to.
///
/// Switching into `unlimited` pins the end date to 100 years after `starting_date`.
pub fn plan_renewal(
    calendar: &Calendar,
    current: &Service,
    starting_date: DateTime<Utc>,
    new_ending_date: DateTime<Utc>,
    new_payment_type: Option<PaymentType>,
) -> RenewalPlan {
    let payment_type = new_payment_type.unwrap_or(current.payment_type);
    let type_changed = payment_type != current.payment_type;

    let ending_date = if payment_type.is_unlimited() && !current.payment_type.is_unlimited() {
        calendar
            .add_duration(starting_date, PaymentType::Unlimited)
            .unwrap_or(new_ending_date)
    } else {
        new_ending_date
    };

    let case = if current.payment_type.is_unlimited() || payment_type.is_unlimited() {
        if type_changed || ending_date != current.ending_date {
            RenewalCase::UnlimitedTransition
        } else {
            RenewalCase::Unchanged
        }
    } else if ending_date > current.ending_date {
        RenewalCase::ForwardExtension(
            calendar.classify_renewal_bucket(current.ending_date, ending_date),
        )
    } else if ending_date < current.ending_date {
        RenewalCase::Shortened
    } else if type_changed {
        RenewalCase::PaymentTypeChange
    } else {
        RenewalCase::Unchanged
    };

    RenewalPlan {
        case,
        ending_date,
        payment_type,
    }
}

/// Field changes applied together with a renewal. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub category: Option<String>,
    pub period_price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub active: Option<bool>,
    pub starting_date: Option<DateTime<Utc>>,
    pub terminal: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOutcome {
    pub service: Service,
    pub case: RenewalCase,
    pub previous_ending_date: DateTime<Utc>,
    pub history_recorded: bool,
}

fn update_failed(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound(what) => EngineError::NotFound {
            entity: "service",
            id: what,
        },
        StoreError::Conflict(what) => EngineError::Conflict(what),
        StoreError::Stale(what) => EngineError::Store(StoreError::Stale(what)),
        other => EngineError::ServiceUpdateFailed(other),
    }
}

pub(crate) fn is_stale(e: &EngineError) -> bool {
    matches!(e, EngineError::Store(StoreError::Stale(_)))
}

fn password_matches(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

impl Engine {
    /// Moves a service to a new end date and optionally a new payment type, writing the
    /// service row, the renewal record and the regenerated reminder in one transaction.
    ///
    /// `service` is the snapshot the change is planned from. If the stored end date moved
    /// since, nothing is written and the call fails with `StoreError::Stale`.
    pub async fn extend_service(
        &self,
        service: &Service,
        new_ending_date: DateTime<Utc>,
        new_payment_type: Option<PaymentType>,
        patch: ServicePatch,
    ) -> EngineResult<RenewalOutcome> {
        let now = self.now();
        let starting_date = patch.starting_date.unwrap_or(service.starting_date);
        let plan = plan_renewal(
            self.calendar(),
            service,
            starting_date,
            new_ending_date,
            new_payment_type,
        );

        validate_window(starting_date, plan.ending_date).map_err(EngineError::Validation)?;
        if let Some(price) = patch.period_price {
            if price.is_sign_negative() {
                return Err(EngineError::Validation("periodPrice must not be negative".into()));
            }
        }

        let updated = Service {
            name: patch.name.unwrap_or_else(|| service.name.clone()),
            description: patch.description.or_else(|| service.description.clone()),
            company_name: patch.company_name.or_else(|| service.company_name.clone()),
            category: patch.category.unwrap_or_else(|| service.category.clone()),
            payment_type: plan.payment_type,
            period_price: patch.period_price.unwrap_or(service.period_price),
            currency: patch.currency.unwrap_or(service.currency),
            active: patch.active.unwrap_or(service.active),
            starting_date,
            ending_date: plan.ending_date,
            terminal: patch.terminal.or_else(|| service.terminal.clone()),
            ..service.clone()
        };

        let history = plan.renewal_bucket().map(|bucket| NewRenewHistory {
            name: updated.name.clone(),
            renewal_type: bucket,
            previous_end_date: service.ending_date,
            new_end_date: plan.ending_date,
            service_id: service.id,
            created_at: now,
        });
        let history_recorded = history.is_some();

        let reminders = if plan.regenerates_reminders() {
            ReminderAction::Replace(expiry_reminder(plan.payment_type, plan.ending_date, now))
        } else {
            ReminderAction::Keep
        };

        let saved = self
            .store()
            .apply_service_change(ServiceChange {
                service: updated,
                expected_ending_date: Some(service.ending_date),
                history,
                reminders,
            })
            .await
            .map_err(update_failed)?;

        log::info!(
            "service updated service_id={} case={:?} previous_end={} new_end={}",
            saved.id,
            plan.case,
            service.ending_date,
            saved.ending_date
        );

        Ok(RenewalOutcome {
            service: saved,
            case: plan.case,
            previous_ending_date: service.ending_date,
            history_recorded,
        })
    }

    /// Renewal requested by a device client holding the shared renew password.
    ///
    /// Without an explicit end date the service is extended by one year from the later of
    /// its current end and today.
    pub async fn renew(
        &self,
        service_id: i32,
        renew_password: &str,
        expected_password: &str,
        ending_date: Option<DateTime<Utc>>,
    ) -> EngineResult<RenewalOutcome> {
        if !password_matches(renew_password, expected_password) {
            log::warn!("renewal rejected: bad password service_id={}", service_id);
            return Err(EngineError::InvalidRenewPassword);
        }

        let mut attempt = 1;
        loop {
            match self.renew_once(service_id, ending_date).await {
                Err(e) if is_stale(&e) && attempt < CHANGE_ATTEMPTS => {
                    log::info!(
                        "service changed during renewal, retrying service_id={} attempt={}",
                        service_id,
                        attempt
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn renew_once(
        &self,
        service_id: i32,
        ending_date: Option<DateTime<Utc>>,
    ) -> EngineResult<RenewalOutcome> {
        let service = self.require_service(service_id).await?;
        let now = self.now();

        let new_ending_date = match ending_date {
            Some(date) => date,
            None => {
                let base = service.ending_date.max(self.calendar().start_of_day(now));
                self.calendar()
                    .add_duration(base, PaymentType::OneYear)
                    .ok_or_else(|| EngineError::Validation("ending date out of range".into()))?
            }
        };

        if new_ending_date <= service.ending_date {
            let err = EngineError::InvalidEndDate {
                current: service.ending_date.to_rfc3339(),
                new: new_ending_date.to_rfc3339(),
            };
            let failure = NewNotification {
                title: RENEWAL_REJECTED_TITLE.to_string(),
                message: format!(
                    "{} hizmeti için yenileme reddedildi: yeni bitiş tarihi ({}) mevcut bitiş tarihinden ({}) sonra olmalı.",
                    service.name,
                    self.format_date(new_ending_date),
                    self.format_date(service.ending_date)
                ),
                kind: NotificationType::Error,
                service_id: Some(service.id),
                bucket: None,
                period_start: None,
                created_at: now,
            };
            if let Err(e) = self.store().insert_notification(failure).await {
                log::warn!("renewal failure notification not stored service_id={}: {e}", service.id);
            }
            return Err(err);
        }

        let outcome = self
            .extend_service(&service, new_ending_date, None, ServicePatch::default())
            .await?;

        let success = NewNotification {
            title: RENEWED_TITLE.to_string(),
            message: format!(
                "{} hizmeti {} tarihine kadar yenilendi.",
                outcome.service.name,
                self.format_date(outcome.service.ending_date)
            ),
            kind: NotificationType::Success,
            service_id: Some(outcome.service.id),
            bucket: None,
            period_start: None,
            created_at: now,
        };
        if let Err(e) = self.store().insert_notification(success).await {
            log::warn!("renewal notification not stored service_id={}: {e}", service.id);
        }

        Ok(outcome)
    }

    pub(crate) fn format_date(&self, d: DateTime<Utc>) -> String {
        self.calendar().local_date(d).format("%d.%m.%Y").to_string()
    }
}

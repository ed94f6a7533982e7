//! Daily expiry scan.
//!
//! A pure function of "now" and the stored services: it can be triggered by any external
//! scheduler and holds no state between runs. Duplicate alerts are suppressed through the
//! explicit `(service_id, bucket, created_at)` key on stored notifications.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{ExpiryBucket, NewNotification, Notification, NotificationType, Service};
use crate::store::{Store, StoreError};
use crate::trial::{TRIAL_CUSTOMER_KEY, TRIAL_DESCRIPTION_PREFIX};

pub const EXPIRED_TITLE: &str = "Hizmet Süresi Doldu";
pub const EXPIRES_TODAY_TITLE: &str = "Hizmet Süresi Bugün Doluyor";
pub const UPCOMING_TITLE: &str = "Hizmet Süresi Yaklaşıyor";

/// Services ending within this many days land in the upcoming bucket.
pub const UPCOMING_DAYS: i64 = 7;

impl ExpiryBucket {
    pub fn title(&self) -> &'static str {
        match self {
            ExpiryBucket::Expired => EXPIRED_TITLE,
            ExpiryBucket::ExpiresToday => EXPIRES_TODAY_TITLE,
            ExpiryBucket::Upcoming => UPCOMING_TITLE,
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            ExpiryBucket::Expired | ExpiryBucket::ExpiresToday => NotificationType::Error,
            ExpiryBucket::Upcoming => NotificationType::Warning,
        }
    }

    /// Earliest creation time of an existing notification that suppresses a new one.
    pub fn suppress_since(&self, now: DateTime<Utc>, today: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ExpiryBucket::Expired => now - Duration::days(30),
            ExpiryBucket::ExpiresToday => today,
            ExpiryBucket::Upcoming => now - Duration::days(5),
        }
    }
}

/// Bucket for a service ending `days_left` local days from today.
pub fn bucket_for(days_left: i64) -> Option<ExpiryBucket> {
    match days_left {
        d if d < 0 => Some(ExpiryBucket::Expired),
        0 => Some(ExpiryBucket::ExpiresToday),
        d if d <= UPCOMING_DAYS => Some(ExpiryBucket::Upcoming),
        _ => None,
    }
}

/// Held job lock. Dropping it without [`JobLock::release`] unlocks in the background.
struct JobLock {
    store: Arc<dyn Store>,
    key: i64,
    released: bool,
}

impl JobLock {
    async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.store.unlock_job(self.key).await {
            log::error!("expiry scan lock not released key={}: {e}", self.key);
        }
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let key = self.key;
        log::warn!("expiry scan cancelled, releasing lock key={key}");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.unlock_job(key).await {
                        log::error!("expiry scan lock not released key={key}: {e}");
                    }
                });
            }
            Err(_) => log::error!("expiry scan lock leaked key={key}: no runtime"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanOutcome {
    Created,
    Suppressed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetail {
    pub service_id: i32,
    pub service_name: String,
    pub bucket: ExpiryBucket,
    pub days_left: i64,
    pub outcome: ScanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Eligible services inspected.
    pub processed: usize,
    pub new_notifications: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub details: Vec<ScanDetail>,
}

impl Engine {
    /// Runs one expiry scan under the notifier job lock.
    ///
    /// The lock is released even when the returned future is dropped mid-scan.
    pub async fn run_expiry_scan(&self) -> EngineResult<ScanSummary> {
        let key = self.notifier_lock_key();
        if !self.store().try_lock_job(key).await? {
            log::warn!("expiry scan skipped: another run holds the lock");
            return Err(EngineError::NotifierBusy);
        }
        let lock = JobLock {
            store: self.store().clone(),
            key,
            released: false,
        };

        let result = self.scan_services().await;

        lock.release().await;
        result
    }

    async fn scan_services(&self) -> EngineResult<ScanSummary> {
        let now = self.now();
        let today = self.calendar().start_of_day(now);
        let trial_customer_id = self
            .store()
            .find_customer_by_system_key(TRIAL_CUSTOMER_KEY)
            .await?
            .map(|c| c.id);

        let services: Vec<Service> = self
            .store()
            .list_time_bound_services()
            .await?
            .into_iter()
            .filter(|s| s.active && !s.payment_type.is_unlimited())
            .filter(|s| Some(s.customer_id) != trial_customer_id)
            .filter(|s| {
                !s.description
                    .as_deref()
                    .is_some_and(|d| d.starts_with(TRIAL_DESCRIPTION_PREFIX))
            })
            .collect();

        let mut summary = ScanSummary {
            processed: services.len(),
            ..ScanSummary::default()
        };

        for service in &services {
            let days_left = self.calendar().days_between(today, service.ending_date);
            let Some(bucket) = bucket_for(days_left) else {
                continue;
            };

            let (outcome, error) = match self.notify_once(service, bucket, days_left, now, today).await {
                Ok(true) => (ScanOutcome::Created, None),
                Ok(false) => (ScanOutcome::Suppressed, None),
                Err(e) => {
                    log::error!(
                        "expiry scan failed for service_id={} bucket={}: {e}",
                        service.id,
                        bucket.as_str()
                    );
                    (ScanOutcome::Failed, Some(e.to_string()))
                }
            };

            match outcome {
                ScanOutcome::Created => summary.new_notifications += 1,
                ScanOutcome::Suppressed => summary.suppressed += 1,
                ScanOutcome::Failed => summary.failed += 1,
            }
            summary.details.push(ScanDetail {
                service_id: service.id,
                service_name: service.name.clone(),
                bucket,
                days_left,
                outcome,
                error,
            });
        }

        log::info!(
            "expiry scan done processed={} created={} suppressed={} failed={}",
            summary.processed,
            summary.new_notifications,
            summary.suppressed,
            summary.failed
        );
        Ok(summary)
    }

    /// Creates the bucket's notification unless one already exists inside its window.
    async fn notify_once(
        &self,
        service: &Service,
        bucket: ExpiryBucket,
        days_left: i64,
        now: DateTime<Utc>,
        today: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let since = bucket.suppress_since(now, today);
        if self
            .store()
            .notification_exists_since(service.id, bucket, since)
            .await?
        {
            return Ok(false);
        }

        let ending = self.format_date(service.ending_date);
        let message = match bucket {
            ExpiryBucket::Expired => format!(
                "{} hizmetinin süresi {} tarihinde doldu. Müşteri: {}",
                service.name,
                ending,
                service.company_name.as_deref().unwrap_or("-")
            ),
            ExpiryBucket::ExpiresToday => format!(
                "{} hizmetinin süresi bugün ({}) doluyor.",
                service.name, ending
            ),
            ExpiryBucket::Upcoming => format!(
                "{} hizmetinin süresi {} gün içinde ({}) dolacak.",
                service.name, days_left, ending
            ),
        };

        self.store()
            .insert_notification(NewNotification {
                title: bucket.title().to_string(),
                message,
                kind: bucket.notification_type(),
                service_id: Some(service.id),
                bucket: Some(bucket),
                period_start: Some(today),
                created_at: now,
            })
            .await?;
        Ok(true)
    }
}

impl Engine {
    pub async fn list_notifications(&self, unread_only: bool) -> EngineResult<Vec<Notification>> {
        Ok(self.store().list_notifications(unread_only).await?)
    }

    pub async fn mark_notification_read(&self, id: i32) -> EngineResult<()> {
        self.store()
            .mark_notification_read(id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => EngineError::not_found("notification", id),
                other => EngineError::Store(other),
            })
    }

    pub async fn mark_all_notifications_read(&self) -> EngineResult<u64> {
        Ok(self.store().mark_all_notifications_read().await?)
    }
}

// src/reminders.rs

use chrono::{DateTime, Duration, Utc};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{PaymentType, Reminder, ReminderDraft};

/// Regular services are reminded this many days before they end.
pub const EXPIRY_REMINDER_LEAD_DAYS: i64 = 7;

pub const EXPIRY_REMINDER_MESSAGE: &str =
    "Hizmetinizin süresi 1 hafta içinde dolacak. Kesintisiz kullanım için lütfen yenileme yapınız.";

/// Trials are reminded this many days before they end.
pub const TRIAL_REMINDER_LEAD_DAYS: i64 = 2;

pub const TRIAL_REMINDER_MESSAGE: &str =
    "Deneme süreniz 2 gün içinde sona erecek. Kullanmaya devam etmek için lütfen bizimle iletişime geçiniz.";

/// The one-week reminder a service should carry, or `None` for `unlimited`.
pub fn expiry_reminder(
    payment_type: PaymentType,
    ending_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<ReminderDraft> {
    if payment_type.is_unlimited() {
        return None;
    }
    Some(ReminderDraft {
        scheduled_at: ending_date - Duration::days(EXPIRY_REMINDER_LEAD_DAYS),
        message: EXPIRY_REMINDER_MESSAGE.to_string(),
        created_at: now,
    })
}

pub fn trial_reminder(ending_date: DateTime<Utc>, now: DateTime<Utc>) -> ReminderDraft {
    ReminderDraft {
        scheduled_at: ending_date - Duration::days(TRIAL_REMINDER_LEAD_DAYS),
        message: TRIAL_REMINDER_MESSAGE.to_string(),
        created_at: now,
    }
}

impl Engine {
    /// Replaces every reminder of the service with a single one a week before
    /// `ending_date`. Unlimited services end up with none. Repeated calls converge.
    pub async fn schedule_expiry_reminder(
        &self,
        service_id: i32,
        ending_date: DateTime<Utc>,
    ) -> EngineResult<Vec<Reminder>> {
        let service = self.require_service(service_id).await?;
        let draft = expiry_reminder(service.payment_type, ending_date, self.now());
        let reminders = self.store().replace_reminders(service_id, draft).await?;
        log::debug!(
            "reminders rescheduled service_id={} count={}",
            service_id,
            reminders.len()
        );
        Ok(reminders)
    }

    pub async fn list_reminders(&self, service_id: Option<i32>) -> EngineResult<Vec<Reminder>> {
        Ok(self.store().list_reminders(service_id).await?)
    }

    pub async fn delete_reminder(&self, id: i32) -> EngineResult<()> {
        Ok(self.store().delete_reminder(id).await?)
    }
}

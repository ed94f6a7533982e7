//! Storage seam for the lifecycle engine.
//!
//! Every method that touches more than one table runs as a single transaction in each
//! implementation. Callers never stitch multi-table writes together themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    ApiLog, Customer, ExpiryBucket, NewApiLog, NewCustomer, NewNotification, NewRenewHistory,
    NewService, Notification, ParseEnumError, Reminder, ReminderDraft, RenewHistory, Service,
    ServiceMetadata,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The row no longer matches the state the change was planned from.
    #[error("{0} changed since it was read")]
    Stale(String),

    #[error("corrupt row: {0}")]
    Decode(#[from] ParseEnumError),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// What happens to a service's reminders as part of a [`ServiceChange`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderAction {
    Keep,
    /// Delete every reminder of the service, then insert the draft if there is one.
    Replace(Option<ReminderDraft>),
}

/// One atomic service update: the new row, an optional renewal record and the reminder
/// action. Applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct ServiceChange {
    pub service: Service,
    /// When set, the change applies only while the stored end date still equals this
    /// value; otherwise it fails with `Stale` and nothing is written.
    pub expected_ending_date: Option<DateTime<Utc>>,
    pub history: Option<NewRenewHistory>,
    pub reminders: ReminderAction,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer>;
    async fn get_customer(&self, id: i32) -> StoreResult<Option<Customer>>;
    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;
    async fn find_customer_by_system_key(&self, key: &str) -> StoreResult<Option<Customer>>;
    /// Returns the customer holding `key`, creating it from `customer` on first use.
    async fn upsert_system_customer(
        &self,
        key: &str,
        customer: NewCustomer,
    ) -> StoreResult<Customer>;
    /// Fails with `Conflict` while the customer still owns services.
    async fn delete_customer(&self, id: i32) -> StoreResult<()>;

    async fn get_service(&self, id: i32) -> StoreResult<Option<Service>>;
    async fn list_services(&self, customer_id: Option<i32>) -> StoreResult<Vec<Service>>;
    /// Active services that are not `unlimited`.
    async fn list_time_bound_services(&self) -> StoreResult<Vec<Service>>;
    async fn find_service_by_device(&self, device_token: &str) -> StoreResult<Option<Service>>;
    async fn find_active_service_by_name_and_device(
        &self,
        name: &str,
        device_token: &str,
    ) -> StoreResult<Option<Service>>;
    /// Inserts every service with its optional reminder. A duplicate device token fails the
    /// whole batch with `Conflict`.
    async fn create_services(
        &self,
        batch: Vec<(NewService, Option<ReminderDraft>)>,
    ) -> StoreResult<Vec<Service>>;
    async fn apply_service_change(&self, change: ServiceChange) -> StoreResult<Service>;
    async fn update_service_metadata(
        &self,
        id: i32,
        metadata: ServiceMetadata,
    ) -> StoreResult<Service>;
    /// Removes the service together with its reminders and renewal history.
    async fn delete_service(&self, id: i32) -> StoreResult<()>;

    async fn replace_reminders(
        &self,
        service_id: i32,
        reminder: Option<ReminderDraft>,
    ) -> StoreResult<Vec<Reminder>>;
    async fn list_reminders(&self, service_id: Option<i32>) -> StoreResult<Vec<Reminder>>;
    async fn delete_reminder(&self, id: i32) -> StoreResult<()>;

    async fn list_renew_history(&self, service_id: i32) -> StoreResult<Vec<RenewHistory>>;

    async fn insert_notification(&self, notification: NewNotification)
        -> StoreResult<Notification>;
    async fn notification_exists_since(
        &self,
        service_id: i32,
        bucket: ExpiryBucket,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: i32) -> StoreResult<()>;
    async fn mark_all_notifications_read(&self) -> StoreResult<u64>;

    async fn insert_api_log(&self, entry: NewApiLog) -> StoreResult<ApiLog>;
    async fn list_api_logs(&self, service_id: Option<i32>, limit: i64)
        -> StoreResult<Vec<ApiLog>>;

    /// Non-blocking exclusive lock for a background job. `false` when already held.
    async fn try_lock_job(&self, key: i64) -> StoreResult<bool>;
    async fn unlock_job(&self, key: i64) -> StoreResult<()>;
}

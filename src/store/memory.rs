//! In-memory [`Store`] used by tests and by the binary when no database is configured.
//!
//! Multi-table operations stage their writes on a copy of the tables and swap it in only
//! when every step succeeded, which gives the same all-or-nothing behaviour as a database
//! transaction.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::models::{
    ApiLog, Customer, ExpiryBucket, NewApiLog, NewCustomer, NewNotification, NewService,
    Notification, Reminder, ReminderDraft, ReminderStatus, RenewHistory, Service, ServiceMetadata,
};
use crate::store::{ReminderAction, ServiceChange, Store, StoreError, StoreResult};

/// Row storage of a [`MemoryStore`]. Opaque outside this module.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    customers: Vec<Customer>,
    services: Vec<Service>,
    reminders: Vec<Reminder>,
    history: Vec<RenewHistory>,
    notifications: Vec<Notification>,
    api_logs: Vec<ApiLog>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn service_mut(&mut self, id: i32) -> StoreResult<&mut Service> {
        self.services
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("service {id}")))
    }

    fn ensure_device_free(&self, device_token: Option<&str>, except: Option<i32>) -> StoreResult<()> {
        let Some(token) = device_token else {
            return Ok(());
        };
        let taken = self
            .services
            .iter()
            .any(|s| Some(s.id) != except && s.device_token.as_deref() == Some(token));
        if taken {
            return Err(StoreError::Conflict(format!("device_token {token}")));
        }
        Ok(())
    }

    fn replace_reminders(&mut self, service_id: i32, draft: Option<ReminderDraft>) {
        self.reminders.retain(|r| r.service_id != service_id);
        if let Some(draft) = draft {
            let id = self.next_id();
            self.reminders.push(Reminder {
                id,
                scheduled_at: draft.scheduled_at,
                status: ReminderStatus::Scheduled,
                message: draft.message,
                service_id,
                created_at: draft.created_at,
            });
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    service_change: bool,
    api_log: bool,
    notifications_for: HashSet<i32>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    job_locks: RwLock<HashSet<i64>>,
    faults: RwLock<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes service changes and metadata updates fail. Changes fail after all rows were staged.
    pub async fn set_fail_on_service_change(&self, fail: bool) {
        self.faults.write().await.service_change = fail;
    }

    pub async fn set_fail_on_api_log(&self, fail: bool) {
        self.faults.write().await.api_log = fail;
    }

    /// Makes notification inserts for `service_id` fail.
    pub async fn fail_notifications_for(&self, service_id: i32) {
        self.faults.write().await.notifications_for.insert(service_id);
    }

    /// Blocks every table access until the returned guard is dropped.
    pub async fn hold_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }

    pub async fn renew_history_count(&self) -> usize {
        self.tables.read().await.history.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let row = Customer {
            id,
            name: customer.name,
            table_name: customer.table_name,
            email: customer.email,
            phone: customer.phone,
            password: customer.password,
            system_key: None,
            created_at: customer.created_at,
        };
        tables.customers.push(row.clone());
        Ok(row)
    }

    async fn get_customer(&self, id: i32) -> StoreResult<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        Ok(self.tables.read().await.customers.clone())
    }

    async fn find_customer_by_system_key(&self, key: &str) -> StoreResult<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .iter()
            .find(|c| c.system_key.as_deref() == Some(key))
            .cloned())
    }

    async fn upsert_system_customer(
        &self,
        key: &str,
        customer: NewCustomer,
    ) -> StoreResult<Customer> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .customers
            .iter()
            .find(|c| c.system_key.as_deref() == Some(key))
        {
            return Ok(existing.clone());
        }
        let id = tables.next_id();
        let row = Customer {
            id,
            name: customer.name,
            table_name: customer.table_name,
            email: customer.email,
            phone: customer.phone,
            password: customer.password,
            system_key: Some(key.to_string()),
            created_at: customer.created_at,
        };
        tables.customers.push(row.clone());
        Ok(row)
    }

    async fn delete_customer(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.customers.iter().any(|c| c.id == id) {
            return Err(StoreError::NotFound(format!("customer {id}")));
        }
        let owned = tables.services.iter().filter(|s| s.customer_id == id).count();
        if owned > 0 {
            return Err(StoreError::Conflict(format!(
                "customer {id} still owns {owned} services"
            )));
        }
        tables.customers.retain(|c| c.id != id);
        Ok(())
    }

    async fn get_service(&self, id: i32) -> StoreResult<Option<Service>> {
        let tables = self.tables.read().await;
        Ok(tables.services.iter().find(|s| s.id == id).cloned())
    }

    async fn list_services(&self, customer_id: Option<i32>) -> StoreResult<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .iter()
            .filter(|s| customer_id.map_or(true, |c| s.customer_id == c))
            .cloned()
            .collect())
    }

    async fn list_time_bound_services(&self) -> StoreResult<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .iter()
            .filter(|s| s.active && !s.payment_type.is_unlimited())
            .cloned()
            .collect())
    }

    async fn find_service_by_device(&self, device_token: &str) -> StoreResult<Option<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .iter()
            .find(|s| s.device_token.as_deref() == Some(device_token))
            .cloned())
    }

    async fn find_active_service_by_name_and_device(
        &self,
        name: &str,
        device_token: &str,
    ) -> StoreResult<Option<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .iter()
            .find(|s| s.active && s.name == name && s.device_token.as_deref() == Some(device_token))
            .cloned())
    }

    async fn create_services(
        &self,
        batch: Vec<(NewService, Option<ReminderDraft>)>,
    ) -> StoreResult<Vec<Service>> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut created = Vec::with_capacity(batch.len());

        for (new, reminder) in batch {
            if !staged.customers.iter().any(|c| c.id == new.customer_id) {
                return Err(StoreError::NotFound(format!("customer {}", new.customer_id)));
            }
            staged.ensure_device_free(new.device_token.as_deref(), None)?;

            let id = staged.next_id();
            let service = Service {
                id,
                name: new.name,
                description: new.description,
                company_name: new.company_name,
                category: new.category,
                payment_type: new.payment_type,
                period_price: new.period_price,
                currency: new.currency,
                active: new.active,
                starting_date: new.starting_date,
                ending_date: new.ending_date,
                device_token: new.device_token,
                terminal: new.terminal,
                customer_id: new.customer_id,
                created_at: new.created_at,
            };
            staged.services.push(service.clone());
            staged.replace_reminders(id, reminder);
            created.push(service);
        }

        *tables = staged;
        Ok(created)
    }

    async fn apply_service_change(&self, change: ServiceChange) -> StoreResult<Service> {
        let fail = self.faults.read().await.service_change;
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();

        let id = change.service.id;
        let current = staged.service_mut(id)?;
        if let Some(expected) = change.expected_ending_date {
            if current.ending_date != expected {
                return Err(StoreError::Stale(format!("service {id}")));
            }
        }
        staged.ensure_device_free(change.service.device_token.as_deref(), Some(id))?;
        *staged.service_mut(id)? = change.service.clone();

        if let Some(history) = change.history {
            let history_id = staged.next_id();
            staged.history.push(RenewHistory {
                id: history_id,
                name: history.name,
                renewal_type: history.renewal_type,
                previous_end_date: history.previous_end_date,
                new_end_date: history.new_end_date,
                service_id: history.service_id,
                created_at: history.created_at,
            });
        }

        if let ReminderAction::Replace(draft) = change.reminders {
            staged.replace_reminders(id, draft);
        }

        if fail {
            return Err(StoreError::Unavailable("injected service change failure".into()));
        }

        *tables = staged;
        Ok(change.service)
    }

    async fn update_service_metadata(
        &self,
        id: i32,
        metadata: ServiceMetadata,
    ) -> StoreResult<Service> {
        if self.faults.read().await.service_change {
            return Err(StoreError::Unavailable("injected service change failure".into()));
        }
        let mut tables = self.tables.write().await;
        let service = tables.service_mut(id)?;
        service.name = metadata.name;
        service.company_name = metadata.company_name;
        service.terminal = metadata.terminal;
        Ok(service.clone())
    }

    async fn delete_service(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.service_mut(id)?;
        tables.services.retain(|s| s.id != id);
        tables.reminders.retain(|r| r.service_id != id);
        tables.history.retain(|h| h.service_id != id);
        for n in tables.notifications.iter_mut().filter(|n| n.service_id == Some(id)) {
            n.service_id = None;
        }
        for l in tables.api_logs.iter_mut().filter(|l| l.service_id == Some(id)) {
            l.service_id = None;
        }
        Ok(())
    }

    async fn replace_reminders(
        &self,
        service_id: i32,
        reminder: Option<ReminderDraft>,
    ) -> StoreResult<Vec<Reminder>> {
        let mut tables = self.tables.write().await;
        tables.service_mut(service_id)?;
        tables.replace_reminders(service_id, reminder);
        Ok(tables
            .reminders
            .iter()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn list_reminders(&self, service_id: Option<i32>) -> StoreResult<Vec<Reminder>> {
        let tables = self.tables.read().await;
        let mut reminders: Vec<Reminder> = tables
            .reminders
            .iter()
            .filter(|r| service_id.map_or(true, |id| r.service_id == id))
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.scheduled_at);
        Ok(reminders)
    }

    async fn delete_reminder(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.reminders.len();
        tables.reminders.retain(|r| r.id != id);
        if tables.reminders.len() == before {
            return Err(StoreError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    async fn list_renew_history(&self, service_id: i32) -> StoreResult<Vec<RenewHistory>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RenewHistory> = tables
            .history
            .iter()
            .filter(|h| h.service_id == service_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        if let Some(service_id) = notification.service_id {
            if self.faults.read().await.notifications_for.contains(&service_id) {
                return Err(StoreError::Unavailable(format!(
                    "injected notification failure for service {service_id}"
                )));
            }
        }
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let row = Notification {
            id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            read: false,
            service_id: notification.service_id,
            bucket: notification.bucket,
            period_start: notification.period_start,
            created_at: notification.created_at,
        };
        tables.notifications.push(row.clone());
        Ok(row)
    }

    async fn notification_exists_since(
        &self,
        service_id: i32,
        bucket: ExpiryBucket,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.notifications.iter().any(|n| {
            n.service_id == Some(service_id) && n.bucket == Some(bucket) && n.created_at >= since
        }))
    }

    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn mark_notification_read(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;
        row.read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for n in tables.notifications.iter_mut().filter(|n| !n.read) {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_api_log(&self, entry: NewApiLog) -> StoreResult<ApiLog> {
        if self.faults.read().await.api_log {
            return Err(StoreError::Unavailable("injected api log failure".into()));
        }
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let row = ApiLog {
            id,
            endpoint: entry.endpoint,
            method: entry.method,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            request_body: entry.request_body,
            response_status: entry.response_status,
            response_body: entry.response_body,
            service_name: entry.service_name,
            device_token: entry.device_token,
            validation_type: entry.validation_type,
            service_id: entry.service_id,
            created_at: entry.created_at,
        };
        tables.api_logs.push(row.clone());
        Ok(row)
    }

    async fn list_api_logs(&self, service_id: Option<i32>, limit: i64) -> StoreResult<Vec<ApiLog>> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(tables
            .api_logs
            .iter()
            .rev()
            .filter(|l| service_id.map_or(true, |id| l.service_id == Some(id)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn try_lock_job(&self, key: i64) -> StoreResult<bool> {
        Ok(self.job_locks.write().await.insert(key))
    }

    async fn unlock_job(&self, key: i64) -> StoreResult<()> {
        self.job_locks.write().await.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, PaymentType, DEFAULT_CATEGORY};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).single().expect("valid date")
    }

    fn customer() -> NewCustomer {
        NewCustomer {
            name: "Acme".into(),
            table_name: None,
            email: None,
            phone: None,
            password: None,
            created_at: now(),
        }
    }

    fn new_service(customer_id: i32, device: Option<&str>) -> NewService {
        NewService {
            name: "POS App".into(),
            description: None,
            company_name: None,
            category: DEFAULT_CATEGORY.into(),
            payment_type: PaymentType::OneYear,
            period_price: Decimal::ZERO,
            currency: Currency::TL,
            active: true,
            starting_date: now(),
            ending_date: now() + Duration::days(365),
            device_token: device.map(str::to_string),
            terminal: None,
            customer_id,
            created_at: now(),
        }
    }

    #[tokio::test]
    async fn duplicate_device_rolls_back_the_whole_batch() {
        let store = MemoryStore::new();
        let c = store.insert_customer(customer()).await.expect("customer");
        store
            .create_services(vec![(new_service(c.id, Some("dev-1")), None)])
            .await
            .expect("first");

        let err = store
            .create_services(vec![
                (new_service(c.id, Some("dev-2")), None),
                (new_service(c.id, Some("dev-1")), None),
            ])
            .await
            .expect_err("duplicate device");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_services(None).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn customer_with_services_cannot_be_deleted() {
        let store = MemoryStore::new();
        let c = store.insert_customer(customer()).await.expect("customer");
        let created = store
            .create_services(vec![(new_service(c.id, None), None)])
            .await
            .expect("service");

        assert!(matches!(store.delete_customer(c.id).await, Err(StoreError::Conflict(_))));
        store.delete_service(created[0].id).await.expect("delete service");
        store.delete_customer(c.id).await.expect("delete customer");
    }

    #[tokio::test]
    async fn system_customer_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.upsert_system_customer("trial", customer()).await.expect("first");
        let b = store.upsert_system_customer("trial", customer()).await.expect("second");
        assert_eq!(a.id, b.id);
        assert_eq!(store.list_customers().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn job_lock_is_exclusive_until_released() {
        let store = MemoryStore::new();
        assert!(store.try_lock_job(7).await.expect("lock"));
        assert!(!store.try_lock_job(7).await.expect("lock again"));
        store.unlock_job(7).await.expect("unlock");
        assert!(store.try_lock_job(7).await.expect("relock"));
    }
}

// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tokio::sync::Mutex;

use crate::models::{
    ApiLog, Customer, ExpiryBucket, NewApiLog, NewCustomer, NewNotification, NewRenewHistory,
    NewService, Notification, Reminder, ReminderDraft, RenewHistory, Service, ServiceMetadata,
};
use crate::store::{ReminderAction, ServiceChange, Store, StoreError, StoreResult};

const CUSTOMER_COLUMNS: &str =
    "id, name, table_name, email, phone, password, system_key, created_at";

const SERVICE_COLUMNS: &str = "id, name, description, company_name, category, payment_type, \
     period_price, currency, active, starting_date, ending_date, device_token, terminal, \
     customer_id, created_at";

const REMINDER_COLUMNS: &str = "id, scheduled_at, status, message, service_id, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, title, message, type, read, service_id, bucket, period_start, created_at";

const API_LOG_COLUMNS: &str = "id, endpoint, method, ip_address, user_agent, request_body, \
     response_status, response_body, service_name, device_token, validation_type, service_id, \
     created_at";

/// Maps sqlx errors onto the store taxonomy; unique violations become `Conflict`.
fn db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Database(e),
    }
}

fn customer_from_row(r: &PgRow) -> StoreResult<Customer> {
    Ok(Customer {
        id: r.try_get("id").map_err(db_err)?,
        name: r.try_get("name").map_err(db_err)?,
        table_name: r.try_get("table_name").map_err(db_err)?,
        email: r.try_get("email").map_err(db_err)?,
        phone: r.try_get("phone").map_err(db_err)?,
        password: r.try_get("password").map_err(db_err)?,
        system_key: r.try_get("system_key").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

fn service_from_row(r: &PgRow) -> StoreResult<Service> {
    let payment_type: String = r.try_get("payment_type").map_err(db_err)?;
    let currency: String = r.try_get("currency").map_err(db_err)?;
    Ok(Service {
        id: r.try_get("id").map_err(db_err)?,
        name: r.try_get("name").map_err(db_err)?,
        description: r.try_get("description").map_err(db_err)?,
        company_name: r.try_get("company_name").map_err(db_err)?,
        category: r.try_get("category").map_err(db_err)?,
        payment_type: payment_type.parse()?,
        period_price: r.try_get("period_price").map_err(db_err)?,
        currency: currency.parse()?,
        active: r.try_get("active").map_err(db_err)?,
        starting_date: r.try_get("starting_date").map_err(db_err)?,
        ending_date: r.try_get("ending_date").map_err(db_err)?,
        device_token: r.try_get("device_token").map_err(db_err)?,
        terminal: r.try_get("terminal").map_err(db_err)?,
        customer_id: r.try_get("customer_id").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

fn reminder_from_row(r: &PgRow) -> StoreResult<Reminder> {
    let status: String = r.try_get("status").map_err(db_err)?;
    Ok(Reminder {
        id: r.try_get("id").map_err(db_err)?,
        scheduled_at: r.try_get("scheduled_at").map_err(db_err)?,
        status: status.parse()?,
        message: r.try_get("message").map_err(db_err)?,
        service_id: r.try_get("service_id").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

fn history_from_row(r: &PgRow) -> StoreResult<RenewHistory> {
    let renewal_type: String = r.try_get("type").map_err(db_err)?;
    Ok(RenewHistory {
        id: r.try_get("id").map_err(db_err)?,
        name: r.try_get("name").map_err(db_err)?,
        renewal_type: renewal_type.parse()?,
        previous_end_date: r.try_get("previous_end_date").map_err(db_err)?,
        new_end_date: r.try_get("new_end_date").map_err(db_err)?,
        service_id: r.try_get("service_id").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

fn notification_from_row(r: &PgRow) -> StoreResult<Notification> {
    let kind: String = r.try_get("type").map_err(db_err)?;
    let bucket: Option<String> = r.try_get("bucket").map_err(db_err)?;
    Ok(Notification {
        id: r.try_get("id").map_err(db_err)?,
        title: r.try_get("title").map_err(db_err)?,
        message: r.try_get("message").map_err(db_err)?,
        kind: kind.parse()?,
        read: r.try_get("read").map_err(db_err)?,
        service_id: r.try_get("service_id").map_err(db_err)?,
        bucket: bucket.as_deref().map(str::parse::<ExpiryBucket>).transpose()?,
        period_start: r.try_get("period_start").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

fn api_log_from_row(r: &PgRow) -> StoreResult<ApiLog> {
    Ok(ApiLog {
        id: r.try_get("id").map_err(db_err)?,
        endpoint: r.try_get("endpoint").map_err(db_err)?,
        method: r.try_get("method").map_err(db_err)?,
        ip_address: r.try_get("ip_address").map_err(db_err)?,
        user_agent: r.try_get("user_agent").map_err(db_err)?,
        request_body: r.try_get("request_body").map_err(db_err)?,
        response_status: r.try_get("response_status").map_err(db_err)?,
        response_body: r.try_get("response_body").map_err(db_err)?,
        service_name: r.try_get("service_name").map_err(db_err)?,
        device_token: r.try_get("device_token").map_err(db_err)?,
        validation_type: r.try_get("validation_type").map_err(db_err)?,
        service_id: r.try_get("service_id").map_err(db_err)?,
        created_at: r.try_get("created_at").map_err(db_err)?,
    })
}

async fn insert_service(conn: &mut PgConnection, new: NewService) -> StoreResult<Service> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO services
                (name, description, company_name, category, payment_type, period_price, currency,
                 active, starting_date, ending_date, device_token, terminal, customer_id, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
           RETURNING {SERVICE_COLUMNS}"#
    ))
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.company_name)
    .bind(&new.category)
    .bind(new.payment_type.as_str())
    .bind(new.period_price)
    .bind(new.currency.as_str())
    .bind(new.active)
    .bind(new.starting_date)
    .bind(new.ending_date)
    .bind(&new.device_token)
    .bind(&new.terminal)
    .bind(new.customer_id)
    .bind(new.created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;

    service_from_row(&row)
}

async fn replace_reminders_in(
    conn: &mut PgConnection,
    service_id: i32,
    draft: Option<ReminderDraft>,
) -> StoreResult<()> {
    sqlx::query("DELETE FROM reminders WHERE service_id = $1")
        .bind(service_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    if let Some(draft) = draft {
        sqlx::query(
            r#"INSERT INTO reminders (scheduled_at, status, message, service_id, created_at)
               VALUES ($1, 'SCHEDULED', $2, $3, $4)"#,
        )
        .bind(draft.scheduled_at)
        .bind(&draft.message)
        .bind(service_id)
        .bind(draft.created_at)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

async fn insert_history(conn: &mut PgConnection, history: NewRenewHistory) -> StoreResult<()> {
    sqlx::query(
        r#"INSERT INTO renew_history (name, type, previous_end_date, new_end_date, service_id, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(&history.name)
    .bind(history.renewal_type.as_str())
    .bind(history.previous_end_date)
    .bind(history.new_end_date)
    .bind(history.service_id)
    .bind(history.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub struct PgStore {
    pool: PgPool,
    // Advisory locks are session-scoped, so the connection that took one is parked here
    // until the lock is released.
    job_locks: Mutex<HashMap<i64, PoolConnection<Postgres>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            job_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO customers (name, table_name, email, phone, password, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {CUSTOMER_COLUMNS}"#
        ))
        .bind(&customer.name)
        .bind(&customer.table_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.password)
        .bind(customer.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        customer_from_row(&row)
    }

    async fn get_customer(&self, id: i32) -> StoreResult<Option<Customer>> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(customer_from_row).transpose()
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(customer_from_row).collect()
    }

    async fn find_customer_by_system_key(&self, key: &str) -> StoreResult<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE system_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(customer_from_row).transpose()
    }

    async fn upsert_system_customer(
        &self,
        key: &str,
        customer: NewCustomer,
    ) -> StoreResult<Customer> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(&format!(
            r#"INSERT INTO customers (name, table_name, email, phone, password, system_key, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (system_key)
               DO UPDATE SET system_key = EXCLUDED.system_key
               RETURNING {CUSTOMER_COLUMNS}"#
        ))
        .bind(&customer.name)
        .bind(&customer.table_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.password)
        .bind(key)
        .bind(customer.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        customer_from_row(&row)
    }

    async fn delete_customer(&self, id: i32) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let owned: i64 = sqlx::query("SELECT COUNT(*) AS owned FROM services WHERE customer_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?
            .try_get("owned")
            .map_err(db_err)?;
        if owned > 0 {
            return Err(StoreError::Conflict(format!(
                "customer {id} still owns {owned} services"
            )));
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("customer {id}")));
        }

        tx.commit().await.map_err(db_err)
    }

    async fn get_service(&self, id: i32) -> StoreResult<Option<Service>> {
        let row = sqlx::query(&format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(service_from_row).transpose()
    }

    async fn list_services(&self, customer_id: Option<i32>) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {SERVICE_COLUMNS}
               FROM services
               WHERE $1::int IS NULL OR customer_id = $1
               ORDER BY ending_date ASC"#
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(service_from_row).collect()
    }

    async fn list_time_bound_services(&self) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {SERVICE_COLUMNS}
               FROM services
               WHERE active = true AND payment_type <> 'unlimited'
               ORDER BY ending_date ASC"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(service_from_row).collect()
    }

    async fn find_service_by_device(&self, device_token: &str) -> StoreResult<Option<Service>> {
        let row = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE device_token = $1"
        ))
        .bind(device_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(service_from_row).transpose()
    }

    async fn find_active_service_by_name_and_device(
        &self,
        name: &str,
        device_token: &str,
    ) -> StoreResult<Option<Service>> {
        let row = sqlx::query(&format!(
            r#"SELECT {SERVICE_COLUMNS}
               FROM services
               WHERE name = $1 AND device_token = $2 AND active = true"#
        ))
        .bind(name)
        .bind(device_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(service_from_row).transpose()
    }

    async fn create_services(
        &self,
        batch: Vec<(NewService, Option<ReminderDraft>)>,
    ) -> StoreResult<Vec<Service>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut created = Vec::with_capacity(batch.len());

        for (new, reminder) in batch {
            let service = insert_service(&mut tx, new).await?;
            replace_reminders_in(&mut tx, service.id, reminder).await?;
            created.push(service);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(created)
    }

    async fn apply_service_change(&self, change: ServiceChange) -> StoreResult<Service> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let s = &change.service;

        let row = sqlx::query(&format!(
            r#"UPDATE services
               SET name = $2, description = $3, company_name = $4, category = $5,
                   payment_type = $6, period_price = $7, currency = $8, active = $9,
                   starting_date = $10, ending_date = $11, device_token = $12, terminal = $13
               WHERE id = $1 AND ($14::timestamptz IS NULL OR ending_date = $14)
               RETURNING {SERVICE_COLUMNS}"#
        ))
        .bind(s.id)
        .bind(&s.name)
        .bind(&s.description)
        .bind(&s.company_name)
        .bind(&s.category)
        .bind(s.payment_type.as_str())
        .bind(s.period_price)
        .bind(s.currency.as_str())
        .bind(s.active)
        .bind(s.starting_date)
        .bind(s.ending_date)
        .bind(&s.device_token)
        .bind(&s.terminal)
        .bind(change.expected_ending_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            let exists = sqlx::query("SELECT 1 FROM services WHERE id = $1")
                .bind(s.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
            return Err(match exists {
                Some(_) => StoreError::Stale(format!("service {}", s.id)),
                None => StoreError::NotFound(format!("service {}", s.id)),
            });
        };
        let updated = service_from_row(&row)?;

        if let Some(history) = change.history {
            insert_history(&mut tx, history).await?;
        }

        if let ReminderAction::Replace(draft) = change.reminders {
            replace_reminders_in(&mut tx, updated.id, draft).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    async fn update_service_metadata(
        &self,
        id: i32,
        metadata: ServiceMetadata,
    ) -> StoreResult<Service> {
        let row = sqlx::query(&format!(
            r#"UPDATE services
               SET name = $2, company_name = $3, terminal = $4
               WHERE id = $1
               RETURNING {SERVICE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&metadata.name)
        .bind(&metadata.company_name)
        .bind(&metadata.terminal)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::NotFound(format!("service {id}")))?;

        service_from_row(&row)
    }

    async fn delete_service(&self, id: i32) -> StoreResult<()> {
        // reminders and renew_history cascade; notifications and api_logs are detached.
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("service {id}")));
        }
        Ok(())
    }

    async fn replace_reminders(
        &self,
        service_id: i32,
        reminder: Option<ReminderDraft>,
    ) -> StoreResult<Vec<Reminder>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists = sqlx::query("SELECT 1 FROM services WHERE id = $1 FOR UPDATE")
            .bind(service_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("service {service_id}")));
        }

        replace_reminders_in(&mut tx, service_id, reminder).await?;

        let rows = sqlx::query(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE service_id = $1 ORDER BY scheduled_at"
        ))
        .bind(service_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        rows.iter().map(reminder_from_row).collect()
    }

    async fn list_reminders(&self, service_id: Option<i32>) -> StoreResult<Vec<Reminder>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {REMINDER_COLUMNS}
               FROM reminders
               WHERE $1::int IS NULL OR service_id = $1
               ORDER BY scheduled_at ASC"#
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(reminder_from_row).collect()
    }

    async fn delete_reminder(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    async fn list_renew_history(&self, service_id: i32) -> StoreResult<Vec<RenewHistory>> {
        let rows = sqlx::query(
            r#"SELECT id, name, type, previous_end_date, new_end_date, service_id, created_at
               FROM renew_history
               WHERE service_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(history_from_row).collect()
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO notifications (title, message, type, read, service_id, bucket, period_start, created_at)
               VALUES ($1, $2, $3, false, $4, $5, $6, $7)
               RETURNING {NOTIFICATION_COLUMNS}"#
        ))
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.service_id)
        .bind(notification.bucket.map(|b| b.as_str()))
        .bind(notification.period_start)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        notification_from_row(&row)
    }

    async fn notification_exists_since(
        &self,
        service_id: i32,
        bucket: ExpiryBucket,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS (
                   SELECT 1 FROM notifications
                   WHERE service_id = $1 AND bucket = $2 AND created_at >= $3
               ) AS found"#,
        )
        .bind(service_id)
        .bind(bucket.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_get("found").map_err(db_err)
    }

    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {NOTIFICATION_COLUMNS}
               FROM notifications
               WHERE NOT $1 OR read = false
               ORDER BY created_at DESC, id DESC"#
        ))
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_notification_read(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = true WHERE read = false")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn insert_api_log(&self, entry: NewApiLog) -> StoreResult<ApiLog> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO api_logs
                    (endpoint, method, ip_address, user_agent, request_body, response_status,
                     response_body, service_name, device_token, validation_type, service_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {API_LOG_COLUMNS}"#
        ))
        .bind(&entry.endpoint)
        .bind(&entry.method)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.request_body)
        .bind(entry.response_status)
        .bind(&entry.response_body)
        .bind(&entry.service_name)
        .bind(&entry.device_token)
        .bind(&entry.validation_type)
        .bind(entry.service_id)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        api_log_from_row(&row)
    }

    async fn list_api_logs(&self, service_id: Option<i32>, limit: i64) -> StoreResult<Vec<ApiLog>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {API_LOG_COLUMNS}
               FROM api_logs
               WHERE $1::int IS NULL OR service_id = $1
               ORDER BY created_at DESC, id DESC
               LIMIT $2"#
        ))
        .bind(service_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(api_log_from_row).collect()
    }

    async fn try_lock_job(&self, key: i64) -> StoreResult<bool> {
        let mut held = self.job_locks.lock().await;
        if held.contains_key(&key) {
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let locked: bool = sqlx::query("SELECT pg_try_advisory_lock($1) AS locked")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_err)?
            .try_get("locked")
            .map_err(db_err)?;

        if locked {
            held.insert(key, conn);
        }
        Ok(locked)
    }

    async fn unlock_job(&self, key: i64) -> StoreResult<()> {
        let conn = self.job_locks.lock().await.remove(&key);
        if let Some(mut conn) = conn {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(key)
                .execute(&mut *conn)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::env;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, MutexGuard};

use actix_web::web;
use service_desk::api::auth::{issue_token, Permission};
use service_desk::clock::{Calendar, FixedClock};
use service_desk::engine::Engine;
use service_desk::models::{Currency, NewCustomer, NewService, PaymentType, Service};
use service_desk::store::{MemoryStore, Store};
use service_desk::AppState;

pub const RENEW_PASSWORD: &str = "renew-secret";
pub const JWT_SECRET: &str = "jwt-secret";

/// Noon UTC on the given date.
pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
        .single()
        .expect("valid test date")
}

pub fn build_state(store: Arc<dyn Store>, clock: Arc<FixedClock>) -> web::Data<AppState> {
    web::Data::new(AppState {
        engine: Engine::new(store, clock, Calendar::utc()),
        renew_password: RENEW_PASSWORD.to_string(),
        jwt_secret: JWT_SECRET.to_string(),
    })
}

pub fn memory_state(now: DateTime<Utc>) -> (web::Data<AppState>, Arc<FixedClock>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(now));
    (build_state(store.clone(), clock.clone()), clock, store)
}

pub fn bearer(permissions: &[Permission]) -> (&'static str, String) {
    let token = issue_token(JWT_SECRET, "staff@example.com", permissions, Duration::hours(1))
        .expect("sign token");
    ("Authorization", format!("Bearer {token}"))
}

pub async fn seed_service(
    store: &dyn Store,
    payment_type: PaymentType,
    starting_date: DateTime<Utc>,
    ending_date: DateTime<Utc>,
) -> Service {
    let customer = store
        .insert_customer(NewCustomer {
            name: "Acme".into(),
            table_name: None,
            email: None,
            phone: None,
            password: None,
            created_at: starting_date,
        })
        .await
        .expect("insert customer");

    store
        .create_services(vec![(
            NewService {
                name: "Adisyon".into(),
                description: None,
                company_name: Some("Acme".into()),
                category: "Adisyon Programı".into(),
                payment_type,
                period_price: Decimal::new(1500, 0),
                currency: Currency::TL,
                active: true,
                starting_date,
                ending_date,
                device_token: None,
                terminal: None,
                customer_id: customer.id,
                created_at: starting_date,
            },
            None,
        )])
        .await
        .expect("insert service")
        .remove(0)
}

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the database named by `TEST_DATABASE_URL` and runs migrations.
/// `None` when the variable is unset, so Postgres tests are skipped.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let Ok(test_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
        return None;
    };
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(515151)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    if let Err(e) = sqlx::query(&create_sql).execute(&admin_pool).await {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(515151)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    Some(TestDb { pool, _guard: guard })
}
